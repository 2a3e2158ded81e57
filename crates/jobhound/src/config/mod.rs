pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_config_from_str, DEFAULT_CONFIG_TEMPLATE};
pub use schema::{
    CandidateConfig, Config, DedupConfig, DispatchConfig, LlmConfig, ScraperConfig, SmtpConfig,
    TelegramConfig,
};
