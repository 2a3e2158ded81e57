//! Duplicate-aware ingestion of scraped posts.
//!
//! Every scraped post is compared against all stored, non-deleted posts
//! before insertion. Duplicates are dropped; whether the stored twin has
//! already been triaged decides if anything remains queued for this run.

pub mod dedup;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::db::{post_repo, Database, DatabaseError};
use crate::scrape::ScrapedPost;

pub use dedup::{is_similar, token_set_ratio, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to save screenshot '{path}': {source}")]
    Screenshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a scraped post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The post was new and is now stored (unprocessed).
    Inserted(String),
    /// Duplicate of a post triage already handled; nothing to do.
    DuplicateOfProcessed(String),
    /// Duplicate of a stored post still awaiting triage. The stored row
    /// stays queued, the fresh scrape is dropped.
    DuplicateQueued(String),
}

/// Duplicate filter + persistence for scraped posts.
pub struct Ingestor {
    db: Database,
    screenshots_dir: PathBuf,
    threshold: u8,
}

impl Ingestor {
    pub fn new(db: Database, screenshots_dir: &Path, threshold: u8) -> Self {
        Self {
            db,
            screenshots_dir: screenshots_dir.to_path_buf(),
            threshold,
        }
    }

    /// Ingests one scraped post: linear scan against stored posts, then
    /// screenshot + row persistence when it is new.
    pub fn ingest(&self, post: &ScrapedPost) -> Result<IngestOutcome, IngestError> {
        let existing = post_repo::all_active(&self.db)?;

        for stored in &existing {
            if dedup::token_set_ratio_ci(&post.text, &stored.post_text) > self.threshold {
                debug!(post_id = %stored.id, "Scraped post is a duplicate");
                if stored.processed {
                    return Ok(IngestOutcome::DuplicateOfProcessed(stored.id.clone()));
                }
                return Ok(IngestOutcome::DuplicateQueued(stored.id.clone()));
            }
        }

        let id = Uuid::new_v4().to_string();
        let screenshot_path = match &post.screenshot_png {
            Some(png) => Some(self.save_screenshot(png)?),
            None => None,
        };

        let row = post_repo::PostRow {
            id: id.clone(),
            post_text: post.text.clone(),
            post_url: post.url.clone(),
            screenshot_path: screenshot_path.map(|p| p.display().to_string()),
            processed: false,
            deleted: false,
            created_at: Utc::now().to_rfc3339(),
        };
        post_repo::insert(&self.db, &row)?;

        debug!(post_id = %id, "Stored new post");
        Ok(IngestOutcome::Inserted(id))
    }

    fn save_screenshot(&self, png: &[u8]) -> Result<PathBuf, IngestError> {
        std::fs::create_dir_all(&self.screenshots_dir).map_err(|e| IngestError::Screenshot {
            path: self.screenshots_dir.clone(),
            source: e,
        })?;

        let path = self
            .screenshots_dir
            .join(format!("{}.png", Uuid::new_v4()));
        std::fs::write(&path, png).map_err(|e| IngestError::Screenshot {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Extracts the first email address from a free-form credentials blob.
pub fn extract_email(text: &str) -> Option<String> {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .unwrap_or_else(|e| panic!("invalid email regex: {}", e))
    });
    re.find(text).map(|m| m.as_str().to_string())
}
