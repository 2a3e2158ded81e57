//! Vacancy repository — CRUD operations for the `vacancies` table.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// Whether a posting mentions visa sponsorship.
///
/// Stored as TEXT; `provided` and `not_mentioned` make a vacancy eligible
/// for evaluation, the other two exclude it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaStatus {
    Provided,
    NotProvided,
    NotMentioned,
    NotRequired,
}

impl VisaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaStatus::Provided => "provided",
            VisaStatus::NotProvided => "not_provided",
            VisaStatus::NotMentioned => "not_mentioned",
            VisaStatus::NotRequired => "not_required",
        }
    }

    /// Parses a stored value. Unknown strings fall back to `NotMentioned`
    /// rather than failing the row read.
    pub fn parse(s: &str) -> Self {
        match s {
            "provided" => VisaStatus::Provided,
            "not_provided" => VisaStatus::NotProvided,
            "not_required" => VisaStatus::NotRequired,
            _ => VisaStatus::NotMentioned,
        }
    }
}

/// Where a vacancy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Linkedin,
    Other,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Linkedin => "linkedin",
            Source::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "linkedin" => Source::Linkedin,
            _ => Source::Other,
        }
    }
}

/// A raw vacancy row from the database.
#[derive(Debug, Clone)]
pub struct VacancyRow {
    pub id: String,
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub credentials: Option<String>,
    pub visa_status: VisaStatus,
    pub source: Source,
    pub post_id: Option<String>,
    pub processed: bool,
    pub deleted: bool,
    pub created_at: String,
}

impl VacancyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let visa: String = row.get("visa_status")?;
        let source: String = row.get("source")?;
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            company: row.get("company")?,
            description: row.get("description")?,
            credentials: row.get("credentials")?,
            visa_status: VisaStatus::parse(&visa),
            source: Source::parse(&source),
            post_id: row.get("post_id")?,
            processed: row.get("processed")?,
            deleted: row.get("deleted")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Query filter parameters for vacancy listing.
#[derive(Debug, Default, Clone)]
pub struct VacancyFilter {
    pub processed: Option<bool>,
    pub visa_status: Option<VisaStatus>,
    pub source: Option<Source>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new vacancy row.
pub fn insert(db: &Database, vacancy: &VacancyRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vacancies (id, title, company, description, credentials, visa_status,
             source, post_id, processed, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                vacancy.id,
                vacancy.title,
                vacancy.company,
                vacancy.description,
                vacancy.credentials,
                vacancy.visa_status.as_str(),
                vacancy.source.as_str(),
                vacancy.post_id,
                vacancy.processed,
                vacancy.deleted,
                vacancy.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a vacancy by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<VacancyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM vacancies WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], VacancyRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds vacancies linked to a post.
pub fn find_by_post(db: &Database, post_id: &str) -> Result<Vec<VacancyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM vacancies WHERE post_id = ?1")?;
        let rows: Vec<VacancyRow> = stmt
            .query_map(params![post_id], VacancyRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns vacancies the evaluation stage should look at: visa sponsorship
/// provided or unmentioned, not yet processed, not deleted.
pub fn find_eligible(db: &Database) -> Result<Vec<VacancyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM vacancies
             WHERE visa_status IN ('provided', 'not_mentioned')
               AND processed = 0 AND deleted = 0
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows: Vec<VacancyRow> = stmt
            .query_map([], VacancyRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Queries vacancies with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &VacancyFilter,
) -> Result<(Vec<VacancyRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = vec!["deleted = 0".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(processed) = filter.processed {
            conditions.push(format!("processed = ?{}", param_values.len() + 1));
            param_values.push(Box::new(processed));
        }
        if let Some(visa) = filter.visa_status {
            conditions.push(format!("visa_status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(visa.as_str().to_string()));
        }
        if let Some(source) = filter.source {
            conditions.push(format!("source = ?{}", param_values.len() + 1));
            param_values.push(Box::new(source.as_str().to_string()));
        }
        if let Some(ref from_date) = filter.from_date {
            conditions.push(format!("created_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(from_date.clone()));
        }
        if let Some(ref to_date) = filter.to_date {
            conditions.push(format!("created_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(to_date.clone()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM vacancies {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM vacancies {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<VacancyRow> = stmt
            .query_map(params_ref.as_slice(), VacancyRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Marks a vacancy as processed by the evaluation stage.
pub fn mark_processed(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE vacancies SET processed = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

/// Soft-deletes a vacancy.
pub fn mark_deleted(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE vacancies SET deleted = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

/// Counts vacancies with the given processed flag.
pub fn count_by_processed(db: &Database, processed: bool) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM vacancies WHERE processed = ?1 AND deleted = 0",
            params![processed],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
