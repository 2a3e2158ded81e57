//! SQLite persistence for posts, vacancies, and everything derived from
//! them.
//!
//! One `Database` handle wraps one rusqlite connection behind a mutex;
//! clones share it. SQLite serializes writes anyway, so a single guarded
//! connection costs nothing at this workload (tens of rows per run).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod email_repo;
pub mod error;
pub mod evaluation_repo;
pub mod migrations;
pub mod post_repo;
pub mod resume_repo;
pub mod telegram_repo;
pub mod vacancy_repo;

pub use error::DatabaseError;

/// Cheaply cloneable handle over the shared connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file, enables WAL + foreign keys,
    /// and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        log::info!("Database opened at {}", path.display());

        Self::migrate(conn)
    }

    /// In-memory database with the full schema, for tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::migrate(conn)
    }

    fn migrate(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection lock held. Repo modules funnel every
    /// query through here.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.jobhound/data/jobhound.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jobhound").join("data").join("jobhound.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(db: &Database, table: &str) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                r.get(0)
            })?)
        })
        .unwrap()
    }

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        assert!(table_count(&db, "_migrations") > 0);
    }

    #[test]
    fn test_open_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobhound.db");
        let db = Database::open(&path).unwrap();
        assert!(table_count(&db, "_migrations") > 0);
        assert!(path.exists());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO linkedin_posts (id, post_text, created_at) VALUES ('p1', 'Hiring Rust devs', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(table_count(&db2, "linkedin_posts"), 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("jobhound.db"));
        assert!(path.to_string_lossy().contains(".jobhound"));
    }
}
