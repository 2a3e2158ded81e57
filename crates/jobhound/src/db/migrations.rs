//! Embedded-SQL schema migrations.
//!
//! Applied versions are recorded in a `_migrations` table; `run_all`
//! executes whatever is still missing, in order. The one ALTER TABLE
//! migration is guarded so that re-running against a database that
//! already has the column records the version instead of failing.

use std::collections::HashSet;

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    /// Set on ADD COLUMN migrations: when the column is already present
    /// the SQL is skipped but the version is still recorded.
    adds_column: Option<(&'static str, &'static str)>,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_linkedin_posts_table",
        sql: include_str!("sql/001_create_linkedin_posts.sql"),
        adds_column: None,
    },
    Migration {
        version: 2,
        description: "create_vacancies_table",
        sql: include_str!("sql/002_create_vacancies.sql"),
        adds_column: None,
    },
    Migration {
        version: 3,
        description: "create_basic_evaluations_table",
        sql: include_str!("sql/003_create_basic_evaluations.sql"),
        adds_column: None,
    },
    Migration {
        version: 4,
        description: "create_resumes_table",
        sql: include_str!("sql/004_create_resumes.sql"),
        adds_column: None,
    },
    Migration {
        version: 5,
        description: "create_emails_table",
        sql: include_str!("sql/005_create_emails.sql"),
        adds_column: None,
    },
    Migration {
        version: 6,
        description: "create_telegram_status_table",
        sql: include_str!("sql/006_create_telegram_status.sql"),
        adds_column: None,
    },
    Migration {
        version: 7,
        description: "add_post_url_to_linkedin_posts",
        sql: include_str!("sql/007_add_post_url.sql"),
        adds_column: Some(("linkedin_posts", "post_url")),
    },
];

/// Applies every migration not yet recorded on this connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let applied = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<Result<HashSet<_>, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        let satisfied = match migration.adds_column {
            Some((table, column)) => column_exists(conn, table, column)?,
            None => false,
        };

        if satisfied {
            log::info!(
                "Migration v{} already satisfied, recording it as applied",
                migration.version
            );
        } else {
            log::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

/// Column presence check via the `pragma_table_info` table-valued function,
/// which takes the table name as a bound parameter (no identifier splicing).
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    fn migration_count(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_db_applies_all_migrations() {
        let conn = migrated();
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_second_run_is_a_noop() {
        let conn = migrated();
        run_all(&conn).unwrap();
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_column_exists_check() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE test_tbl (id TEXT, name TEXT);")
            .unwrap();

        assert!(column_exists(&conn, "test_tbl", "id").unwrap());
        assert!(column_exists(&conn, "test_tbl", "name").unwrap());
        assert!(!column_exists(&conn, "test_tbl", "missing").unwrap());
        assert!(!column_exists(&conn, "no_such_table", "id").unwrap());
    }

    #[test]
    fn test_posts_table_gains_post_url() {
        let conn = migrated();
        assert!(column_exists(&conn, "linkedin_posts", "post_url").unwrap());
    }

    #[test]
    fn test_guarded_alter_survives_existing_column() {
        let conn = migrated();
        // Forget that v7 ran; the column is still there, so a re-run must
        // record the version without re-executing the ALTER.
        conn.execute("DELETE FROM _migrations WHERE version = 7", [])
            .unwrap();
        run_all(&conn).unwrap();
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_rating_check_constraint() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO vacancies (id, title, description, created_at) VALUES ('v1', 't', 'd', '2026-01-01')",
            [],
        )
        .unwrap();

        // In range passes.
        conn.execute(
            "INSERT INTO basic_evaluations (id, vacancy_id, rating, summary, created_at)
             VALUES ('e1', 'v1', 100, 's', '2026-01-01')",
            [],
        )
        .unwrap();

        // Out of range is rejected by the CHECK.
        let result = conn.execute(
            "INSERT INTO basic_evaluations (id, vacancy_id, rating, summary, created_at)
             VALUES ('e2', 'v1', 101, 's', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_evaluation_unique_per_vacancy() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO vacancies (id, title, description, created_at) VALUES ('v1', 't', 'd', '2026-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO basic_evaluations (id, vacancy_id, rating, summary, created_at)
             VALUES ('e1', 'v1', 50, 's', '2026-01-01')",
            [],
        )
        .unwrap();

        // One evaluation per vacancy.
        let result = conn.execute(
            "INSERT INTO basic_evaluations (id, vacancy_id, rating, summary, created_at)
             VALUES ('e2', 'v1', 60, 's', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}
