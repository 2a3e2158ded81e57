//! Email repository — CRUD operations for the `emails` table.
//!
//! Also home of the anti-spam check: a recipient who already received a
//! sent email within the cutoff window must not get another one.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw outreach-email row from the database.
#[derive(Debug, Clone)]
pub struct EmailRow {
    pub id: String,
    pub vacancy_id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl EmailRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            vacancy_id: row.get("vacancy_id")?,
            recipient: row.get("recipient")?,
            subject: row.get("subject")?,
            body: row.get("body")?,
            sent: row.get("sent")?,
            sent_at: row.get("sent_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new email row (unsent).
pub fn insert(db: &Database, email: &EmailRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO emails (id, vacancy_id, recipient, subject, body, sent, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                email.id,
                email.vacancy_id,
                email.recipient,
                email.subject,
                email.body,
                email.sent,
                email.sent_at,
                email.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds an email by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<EmailRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM emails WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], EmailRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds all emails drafted for a vacancy.
pub fn find_by_vacancy(db: &Database, vacancy_id: &str) -> Result<Vec<EmailRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM emails WHERE vacancy_id = ?1 ORDER BY created_at DESC")?;
        let rows: Vec<EmailRow> = stmt
            .query_map(params![vacancy_id], EmailRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Marks an email as sent at the given timestamp.
pub fn mark_sent(db: &Database, id: &str, sent_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE emails SET sent = 1, sent_at = ?2 WHERE id = ?1",
            params![id, sent_at],
        )?;
        Ok(())
    })
}

/// Returns true when the recipient received a **sent** email created on or
/// after the cutoff timestamp. Drafted-but-unsent rows do not count.
pub fn recipient_emailed_since(
    db: &Database,
    recipient: &str,
    cutoff: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM emails
             WHERE recipient = ?1 AND sent = 1 AND created_at >= ?2",
            params![recipient, cutoff],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Counts sent emails.
pub fn count_sent(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM emails WHERE sent = 1", [], |r| r.get(0))?;
        Ok(count)
    })
}
