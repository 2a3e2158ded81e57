//! Post repository — CRUD operations for the `linkedin_posts` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw scraped-post row from the database.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub post_text: String,
    pub post_url: Option<String>,
    pub screenshot_path: Option<String>,
    pub processed: bool,
    pub deleted: bool,
    pub created_at: String,
}

impl PostRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_text: row.get("post_text")?,
            post_url: row.get("post_url")?,
            screenshot_path: row.get("screenshot_path")?,
            processed: row.get("processed")?,
            deleted: row.get("deleted")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new post row.
pub fn insert(db: &Database, post: &PostRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO linkedin_posts (id, post_text, post_url, screenshot_path, processed, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post.id,
                post.post_text,
                post.post_url,
                post.screenshot_path,
                post.processed,
                post.deleted,
                post.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a post by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<PostRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM linkedin_posts WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], PostRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns all non-deleted posts. The duplicate filter scans these.
pub fn all_active(db: &Database) -> Result<Vec<PostRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM linkedin_posts WHERE deleted = 0 ORDER BY created_at DESC")?;
        let rows: Vec<PostRow> = stmt
            .query_map([], PostRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns non-deleted posts that triage has not yet seen.
pub fn find_unprocessed(db: &Database) -> Result<Vec<PostRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM linkedin_posts WHERE processed = 0 AND deleted = 0
             ORDER BY created_at ASC",
        )?;
        let rows: Vec<PostRow> = stmt
            .query_map([], PostRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Marks a post as processed by triage.
pub fn mark_processed(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE linkedin_posts SET processed = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

/// Soft-deletes a post.
pub fn mark_deleted(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE linkedin_posts SET deleted = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

/// Counts non-deleted posts.
pub fn count_active(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM linkedin_posts WHERE deleted = 0",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
