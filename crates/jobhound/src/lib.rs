pub mod agents;
pub mod artifacts;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod limiter;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod sanitize;
pub mod scrape;
pub mod secrets;

pub use artifacts::ArtifactStore;
pub use config::{default_config_path, load_config, Config, DEFAULT_CONFIG_TEMPLATE};
pub use db::{default_database_path, Database, DatabaseError};
pub use dispatch::{DispatchError, SmtpMailer, TelegramNotifier};
pub use error::{ArtifactError, ConfigError, JobhoundError, Result};
pub use ingest::{IngestOutcome, Ingestor};
pub use limiter::RateLimiter;
pub use llm::{ChatApi, LlmClient, LlmError, LlmProvider};
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use scrape::{EmptySource, LinkedInScraper, PostSource, ScrapeError, ScrapedPost};
pub use secrets::{resolve_secret, resolve_secret_optional, CookieCipher, SecretError};
