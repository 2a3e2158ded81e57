//! End-to-end run: collect, ingest, triage, evaluate, generate, dispatch.

pub mod error;
pub mod report;
pub mod runner;

pub use error::PipelineError;
pub use report::RunReport;
pub use runner::Pipeline;
