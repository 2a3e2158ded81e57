use thiserror::Error;

use crate::db::DatabaseError;
use crate::dispatch::DispatchError;
use crate::error::ArtifactError;
use crate::ingest::IngestError;
use crate::llm::LlmError;
use crate::scrape::ScrapeError;

/// A failure inside one pipeline phase. Per-post and per-vacancy failures
/// are caught by the runner and recorded as warnings; only collection and
/// cross-cutting database errors abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Collection failed: {0}")]
    Collect(#[from] ScrapeError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM stage failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),
}
