//! Evaluation repository — CRUD operations for the `basic_evaluations` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw evaluation row from the database. One per vacancy.
#[derive(Debug, Clone)]
pub struct EvaluationRow {
    pub id: String,
    pub vacancy_id: String,
    pub rating: u8,
    pub summary: String,
    pub created_at: String,
}

impl EvaluationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            vacancy_id: row.get("vacancy_id")?,
            rating: row.get("rating")?,
            summary: row.get("summary")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts an evaluation. The rating is validated here as well as by the
/// schema CHECK so callers get a typed error instead of a bare SQLite one.
pub fn insert(db: &Database, evaluation: &EvaluationRow) -> Result<(), DatabaseError> {
    if evaluation.rating > 100 {
        return Err(DatabaseError::Constraint(format!(
            "rating must be within 0..=100, got {}",
            evaluation.rating
        )));
    }

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO basic_evaluations (id, vacancy_id, rating, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                evaluation.id,
                evaluation.vacancy_id,
                evaluation.rating,
                evaluation.summary,
                evaluation.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds the evaluation for a vacancy, if one exists.
pub fn find_by_vacancy(
    db: &Database,
    vacancy_id: &str,
) -> Result<Option<EvaluationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM basic_evaluations WHERE vacancy_id = ?1")?;
        let mut rows = stmt.query_map(params![vacancy_id], EvaluationRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts evaluations with rating strictly above the threshold.
pub fn count_above(db: &Database, threshold: u8) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM basic_evaluations WHERE rating > ?1",
            params![threshold],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vacancies (id, title, description, created_at) VALUES ('v1', 't', 'd', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn sample_evaluation(id: &str, rating: u8) -> EvaluationRow {
        EvaluationRow {
            id: id.to_string(),
            vacancy_id: "v1".to_string(),
            rating,
            summary: "Solid overlap with the candidate profile.".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_evaluation("e1", 72)).unwrap();

        let found = find_by_vacancy(&db, "v1").unwrap().unwrap();
        assert_eq!(found.rating, 72);
        assert_eq!(found.id, "e1");
    }

    #[test]
    fn test_find_missing() {
        let db = test_db();
        assert!(find_by_vacancy(&db, "v1").unwrap().is_none());
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        let db = test_db();
        let result = insert(&db, &sample_evaluation("e1", 101));
        assert!(matches!(result, Err(DatabaseError::Constraint(_))));
        // Nothing was written.
        assert!(find_by_vacancy(&db, "v1").unwrap().is_none());
    }

    #[test]
    fn test_rating_boundaries_accepted() {
        let db = test_db();
        insert(&db, &sample_evaluation("e1", 0)).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vacancies (id, title, description, created_at) VALUES ('v2', 't', 'd', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        let mut top = sample_evaluation("e2", 100);
        top.vacancy_id = "v2".to_string();
        insert(&db, &top).unwrap();

        assert_eq!(find_by_vacancy(&db, "v1").unwrap().unwrap().rating, 0);
        assert_eq!(find_by_vacancy(&db, "v2").unwrap().unwrap().rating, 100);
    }

    #[test]
    fn test_second_evaluation_for_vacancy_rejected() {
        let db = test_db();
        insert(&db, &sample_evaluation("e1", 50)).unwrap();
        let result = insert(&db, &sample_evaluation("e2", 60));
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn test_count_above() {
        let db = test_db();
        insert(&db, &sample_evaluation("e1", 50)).unwrap();
        assert_eq!(count_above(&db, 50).unwrap(), 0);
        assert_eq!(count_above(&db, 49).unwrap(), 1);
    }
}
