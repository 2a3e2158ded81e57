//! Telegram status repository — tracks notification state per post.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Notification state for a post that went to Telegram instead of email.
#[derive(Debug, Clone)]
pub struct TelegramStatusRow {
    pub id: String,
    pub post_id: String,
    pub status: String,
    pub updated_at: String,
}

impl TelegramStatusRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            status: row.get("status")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SENT: &str = "sent";

/// Inserts or updates the status for a post (one row per post).
pub fn upsert(
    db: &Database,
    id: &str,
    post_id: &str,
    status: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO telegram_status (id, post_id, status, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(post_id) DO UPDATE SET status = ?3, updated_at = ?4",
            params![id, post_id, status, updated_at],
        )?;
        Ok(())
    })
}

/// Finds the status row for a post.
pub fn find_by_post(
    db: &Database,
    post_id: &str,
) -> Result<Option<TelegramStatusRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM telegram_status WHERE post_id = ?1")?;
        let mut rows = stmt.query_map(params![post_id], TelegramStatusRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts rows with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM telegram_status WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
