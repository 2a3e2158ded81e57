use std::path::PathBuf;
use thiserror::Error;

/// Failures from the persistence layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A value rejected in code before it could trip the schema CHECK.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}
