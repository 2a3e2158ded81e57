use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::llm::LlmProvider;
use crate::secrets::{self, SecretError};

/// Top-level configuration, deserialized from a JSON file.
///
/// `scraper`, `smtp`, and `telegram` are optional sections: a run without
/// `scraper` can still triage previously collected posts (`--skip-scrape`
/// forces the same), and dispatch degrades to whichever channels are
/// configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,

    /// SQLite database file. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,

    /// Where rendered resumes land.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// Where per-post screenshots land.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper: Option<ScraperConfig>,

    pub llm: LlmConfig,

    pub candidate: CandidateConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn jobhound_dir(leaf: &str) -> String {
    dirs::home_dir()
        .map(|h| h.join(".jobhound").join(leaf).to_string_lossy().to_string())
        .unwrap_or_else(|| leaf.to_string())
}

fn default_artifacts_dir() -> String {
    jobhound_dir("resumes")
}

fn default_screenshots_dir() -> String {
    jobhound_dir("screenshots")
}

/// LinkedIn scraper settings. Credentials follow the three-source secret
/// pattern and are only needed when no valid cookie jar exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperConfig {
    /// WebDriver endpoint, e.g. `http://localhost:4444/wd/hub`.
    pub webdriver_url: String,

    /// Feed or search-results page to harvest posts from.
    pub search_url: String,

    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Encrypted cookie jar location.
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,

    /// Direct username value (plaintext in the config file; prefer
    /// `usernameFile` or `usernameEnvVar`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_env_var: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,

    #[serde(default = "default_max_posts")]
    pub max_posts: usize,

    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,

    #[serde(default = "default_scroll_pause_secs")]
    pub scroll_pause_secs: u64,
}

fn default_login_url() -> String {
    "https://www.linkedin.com/login".to_string()
}

fn default_cookie_file() -> String {
    jobhound_dir("linkedin_cookies.enc")
}

fn default_max_posts() -> usize {
    20
}

fn default_max_scrolls() -> u32 {
    15
}

fn default_scroll_pause_secs() -> u64 {
    3
}

impl ScraperConfig {
    pub fn resolve_username(&self) -> Result<SecretString, SecretError> {
        secrets::resolve_secret(
            self.username.as_deref(),
            self.username_file.as_deref(),
            self.username_env_var.as_deref(),
        )
    }

    pub fn resolve_password(&self) -> Result<SecretString, SecretError> {
        secrets::resolve_secret(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env_var.as_deref(),
        )
    }

    /// Whether both credential secrets have at least one source. A missing
    /// pair is fine as long as the cookie jar can log us in.
    pub fn has_credentials(&self) -> bool {
        secrets::has_secret_source(
            self.username.as_deref(),
            self.username_file.as_deref(),
            self.username_env_var.as_deref(),
        ) && secrets::has_secret_source(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env_var.as_deref(),
        )
    }
}

/// LLM provider, model, and request-budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Provider preset (openai, ollama, gemini).
    #[serde(default)]
    pub provider: LlmProvider,

    /// Overrides the preset endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Overrides the preset default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Direct API key value (plaintext in the config file; prefer
    /// `apiKeyFile` or `apiKeyEnvVar`). Ollama needs none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,

    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_max_requests_per_window() -> u32 {
    14
}

fn default_window_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        secrets::resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    pub fn has_api_key_source(&self) -> bool {
        secrets::has_secret_source(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            model: None,
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
            max_requests_per_window: default_max_requests_per_window(),
            window_secs: default_window_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

/// The candidate the pipeline applies on behalf of. `profile` is free-form
/// text the evaluation stage rates vacancies against; the rest feeds the
/// generated resume header and email signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateConfig {
    pub profile: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// Appended to generated outreach emails.
    #[serde(default)]
    pub signature: String,
}

/// Outbound SMTP settings for emailed applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub server: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: String,

    /// From address; falls back to `username` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Direct password value (plaintext in the config file; prefer
    /// `passwordFile` or `passwordEnvVar`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpConfig {
    pub fn from_address(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }

    pub fn resolve_password(&self) -> Result<SecretString, SecretError> {
        secrets::resolve_secret(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env_var.as_deref(),
        )
    }

    pub fn has_password(&self) -> bool {
        secrets::has_secret_source(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env_var.as_deref(),
        )
    }
}

/// Telegram notification settings for vacancies without a recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Direct bot token value (plaintext in the config file; prefer
    /// `botTokenFile` or `botTokenEnvVar`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token_env_var: Option<String>,

    pub chat_id: String,
}

impl TelegramConfig {
    pub fn resolve_bot_token(&self) -> Result<SecretString, SecretError> {
        secrets::resolve_secret(
            self.bot_token.as_deref(),
            self.bot_token_file.as_deref(),
            self.bot_token_env_var.as_deref(),
        )
    }

    pub fn has_bot_token(&self) -> bool {
        secrets::has_secret_source(
            self.bot_token.as_deref(),
            self.bot_token_file.as_deref(),
            self.bot_token_env_var.as_deref(),
        )
    }
}

/// Duplicate-filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupConfig {
    /// Token-set similarity (0–100) strictly above which a new post is a
    /// duplicate of a stored one.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u8,
}

fn default_similarity_threshold() -> u8 {
    crate::ingest::dedup::DEFAULT_SIMILARITY_THRESHOLD
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Dispatch gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Vacancies rated at or below this are evaluated but never generate
    /// a resume or any outreach.
    #[serde(default = "default_min_rating")]
    pub min_rating: u8,

    /// A recipient who got a sent email within this many days is skipped.
    #[serde(default = "default_antispam_days")]
    pub antispam_days: i64,
}

fn default_min_rating() -> u8 {
    50
}

fn default_antispam_days() -> i64 {
    30
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_rating: default_min_rating(),
            antispam_days: default_antispam_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_config_default() {
        let dedup = DedupConfig::default();
        assert_eq!(dedup.similarity_threshold, 92);
    }

    #[test]
    fn test_dispatch_config_default() {
        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.min_rating, 50);
        assert_eq!(dispatch.antispam_days, 30);
    }

    #[test]
    fn test_llm_config_defaults() {
        let llm = LlmConfig::default();
        assert_eq!(llm.provider, LlmProvider::Openai);
        assert_eq!(llm.max_requests_per_window, 14);
        assert_eq!(llm.window_secs, 60);
        assert_eq!(llm.retry_attempts, 3);
        assert_eq!(llm.retry_delay_secs, 60);
    }

    #[test]
    fn test_scraper_config_serde_defaults() {
        let json = r#"{
            "webdriverUrl": "http://localhost:4444/wd/hub",
            "searchUrl": "https://www.linkedin.com/search/results/content/?keywords=rust"
        }"#;
        let scraper: ScraperConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scraper.login_url, "https://www.linkedin.com/login");
        assert_eq!(scraper.max_posts, 20);
        assert_eq!(scraper.max_scrolls, 15);
        assert_eq!(scraper.scroll_pause_secs, 3);
        assert!(!scraper.has_credentials());
    }

    #[test]
    fn test_scraper_credentials_need_both_halves() {
        let json = r#"{
            "webdriverUrl": "http://localhost:4444/wd/hub",
            "searchUrl": "https://example.com/feed",
            "username": "me@example.com"
        }"#;
        let scraper: ScraperConfig = serde_json::from_str(json).unwrap();
        assert!(!scraper.has_credentials());
    }

    #[test]
    fn test_smtp_from_falls_back_to_username() {
        let json = r#"{
            "server": "smtp.example.com",
            "username": "me@example.com",
            "password": "hunter2"
        }"#;
        let smtp: SmtpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_address(), "me@example.com");
        assert!(smtp.has_password());
    }

    #[test]
    fn test_secret_triple_uses_camel_case_keys() {
        let json = r#"{
            "botTokenEnvVar": "BOT_TOKEN",
            "chatId": "12345"
        }"#;
        let telegram: TelegramConfig = serde_json::from_str(json).unwrap();
        assert_eq!(telegram.bot_token_env_var.as_deref(), Some("BOT_TOKEN"));
        assert!(telegram.has_bot_token());
    }
}
