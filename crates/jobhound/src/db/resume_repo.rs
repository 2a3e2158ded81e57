//! Resume repository — CRUD operations for the `resumes` table.
//!
//! The list-valued sections (experience, education, skills, projects,
//! certifications) are stored as JSON arrays in TEXT columns.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw resume row from the database.
#[derive(Debug, Clone)]
pub struct ResumeRow {
    pub id: String,
    pub vacancy_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub summary: String,
    pub experience: String,
    pub education: String,
    pub skills: String,
    pub projects: Option<String>,
    pub certifications: Option<String>,
    pub file_path: Option<String>,
    pub created_at: String,
}

impl ResumeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            vacancy_id: row.get("vacancy_id")?,
            full_name: row.get("full_name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            address: row.get("address")?,
            summary: row.get("summary")?,
            experience: row.get("experience")?,
            education: row.get("education")?,
            skills: row.get("skills")?,
            projects: row.get("projects")?,
            certifications: row.get("certifications")?,
            file_path: row.get("file_path")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new resume row.
pub fn insert(db: &Database, resume: &ResumeRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO resumes (id, vacancy_id, full_name, email, phone, address, summary,
             experience, education, skills, projects, certifications, file_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                resume.id,
                resume.vacancy_id,
                resume.full_name,
                resume.email,
                resume.phone,
                resume.address,
                resume.summary,
                resume.experience,
                resume.education,
                resume.skills,
                resume.projects,
                resume.certifications,
                resume.file_path,
                resume.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds all resumes generated for a vacancy.
pub fn find_by_vacancy(db: &Database, vacancy_id: &str) -> Result<Vec<ResumeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM resumes WHERE vacancy_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows: Vec<ResumeRow> = stmt
            .query_map(params![vacancy_id], ResumeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Records the rendered artifact path for a resume.
pub fn set_file_path(db: &Database, id: &str, file_path: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE resumes SET file_path = ?2 WHERE id = ?1",
            params![id, file_path],
        )?;
        Ok(())
    })
}

/// Counts stored resumes.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM resumes", [], |r| r.get(0))?;
        Ok(count)
    })
}
