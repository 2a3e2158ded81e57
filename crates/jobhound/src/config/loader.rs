use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::llm::LlmProvider;

/// Starter config written by `jobhound init`. Parses and validates as-is
/// so a fresh install fails on missing env vars, not on config shape.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"{
  "version": "1.0",
  "scraper": {
    "webdriverUrl": "http://localhost:4444/wd/hub",
    "searchUrl": "https://www.linkedin.com/search/results/content/?keywords=hiring%20rust",
    "usernameEnvVar": "LINKEDIN_EMAIL",
    "passwordEnvVar": "LINKEDIN_PASSWORD"
  },
  "llm": {
    "provider": "openai",
    "apiKeyEnvVar": "LLM_API_KEY"
  },
  "candidate": {
    "profile": "Backend engineer, 5 years of Rust and distributed systems. Looking for remote senior roles.",
    "fullName": "Jane Doe",
    "email": "you@example.com",
    "phone": "+1 555 000 0000",
    "address": "City, Country",
    "signature": "Best regards,\nJane Doe"
  },
  "smtp": {
    "server": "smtp.gmail.com",
    "port": 587,
    "username": "you@example.com",
    "passwordEnvVar": "SMTP_PASSWORD"
  },
  "telegram": {
    "botTokenEnvVar": "BOT_TOKEN",
    "chatId": "123456789"
  }
}
"#;

/// Default config location under the platform config dir.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join("jobhound").join("config.json"))
        .ok_or(ConfigError::NoDefaultPath)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    // Validate candidate
    if config.candidate.profile.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "candidate.profile must not be empty".to_string(),
        });
    }
    if config.candidate.full_name.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "candidate.fullName must not be empty".to_string(),
        });
    }
    if !config.candidate.email.contains('@') {
        return Err(ConfigError::Validation {
            message: format!(
                "candidate.email does not look like an address: '{}'",
                config.candidate.email
            ),
        });
    }

    // Validate scraper section
    if let Some(scraper) = &config.scraper {
        validate_url("scraper.webdriverUrl", &scraper.webdriver_url)?;
        validate_url("scraper.searchUrl", &scraper.search_url)?;
        validate_url("scraper.loginUrl", &scraper.login_url)?;
        if scraper.max_posts == 0 {
            return Err(ConfigError::Validation {
                message: "scraper.maxPosts must be at least 1".to_string(),
            });
        }
    }

    // Validate LLM section
    if let Some(base_url) = &config.llm.base_url {
        validate_url("llm.baseUrl", base_url)?;
    }
    if config.llm.max_requests_per_window == 0 {
        return Err(ConfigError::Validation {
            message: "llm.maxRequestsPerWindow must be at least 1".to_string(),
        });
    }
    if config.llm.window_secs == 0 {
        return Err(ConfigError::Validation {
            message: "llm.windowSecs must be at least 1".to_string(),
        });
    }
    if config.llm.retry_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "llm.retryAttempts must be at least 1".to_string(),
        });
    }
    // Hosted providers reject unauthenticated calls; Ollama has no keys.
    if config.llm.provider != LlmProvider::Ollama && !config.llm.has_api_key_source() {
        return Err(ConfigError::MissingSecret {
            field: "llm.apiKey".to_string(),
            reason: "configure apiKey, apiKeyFile, or apiKeyEnvVar for this provider".to_string(),
        });
    }

    // Validate SMTP section
    if let Some(smtp) = &config.smtp {
        if smtp.server.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "smtp.server must not be empty".to_string(),
            });
        }
        if smtp.username.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "smtp.username must not be empty".to_string(),
            });
        }
        if !smtp.has_password() {
            return Err(ConfigError::MissingSecret {
                field: "smtp.password".to_string(),
                reason: "configure password, passwordFile, or passwordEnvVar".to_string(),
            });
        }
    }

    // Validate Telegram section
    if let Some(telegram) = &config.telegram {
        if telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "telegram.chatId must not be empty".to_string(),
            });
        }
        if !telegram.has_bot_token() {
            return Err(ConfigError::MissingSecret {
                field: "telegram.botToken".to_string(),
                reason: "configure botToken, botTokenFile, or botTokenEnvVar".to_string(),
            });
        }
    }

    // Validate thresholds
    if config.dedup.similarity_threshold > 100 {
        return Err(ConfigError::Validation {
            message: format!(
                "dedup.similarityThreshold must be within 0..=100, got {}",
                config.dedup.similarity_threshold
            ),
        });
    }
    if config.dispatch.min_rating > 100 {
        return Err(ConfigError::Validation {
            message: format!(
                "dispatch.minRating must be within 0..=100, got {}",
                config.dispatch.min_rating
            ),
        });
    }
    if config.dispatch.antispam_days < 0 {
        return Err(ConfigError::Validation {
            message: "dispatch.antispamDays must not be negative".to_string(),
        });
    }

    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("expected an http(s) URL, got '{}'", url),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(extra: &str) -> String {
        format!(
            r#"{{
                "version": "1.0",
                "llm": {{ "provider": "ollama" }},
                "candidate": {{
                    "profile": "Rust developer, 5 years",
                    "fullName": "Jane Doe",
                    "email": "jane@example.com"
                }}{extra}
            }}"#
        )
    }

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(&minimal_config("")).unwrap();
        assert_eq!(config.version, "1.0");
        assert!(config.scraper.is_none());
        assert!(config.smtp.is_none());
        assert_eq!(config.dedup.similarity_threshold, 92);
        assert_eq!(config.dispatch.min_rating, 50);
    }

    #[test]
    fn test_default_template_is_valid() {
        let config = load_config_from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert!(config.scraper.is_some());
        assert!(config.smtp.is_some());
        assert!(config.telegram.is_some());
        assert_eq!(config.llm.max_requests_per_window, 14);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let json = minimal_config("").replace("\"1.0\"", "\"2.0\"");
        assert!(load_config_from_str(&json).is_err());
    }

    #[test]
    fn test_empty_profile_rejected() {
        let json = minimal_config("").replace("Rust developer, 5 years", "   ");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_bad_webdriver_url_rejected() {
        let json = minimal_config(
            r#",
            "scraper": {
                "webdriverUrl": "localhost:4444",
                "searchUrl": "https://example.com/feed"
            }"#,
        );
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("webdriverUrl"));
    }

    #[test]
    fn test_hosted_provider_requires_api_key_source() {
        let json = minimal_config("").replace("ollama", "openai");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("llm.apiKey"));
    }

    #[test]
    fn test_api_key_env_var_source_accepted() {
        let json = minimal_config("").replace(
            r#""provider": "ollama""#,
            r#""provider": "openai", "apiKeyEnvVar": "LLM_API_KEY""#,
        );
        // Source configured is enough; resolution happens at run time.
        assert!(load_config_from_str(&json).is_ok());
    }

    #[test]
    fn test_smtp_without_password_source_rejected() {
        let json = minimal_config(
            r#",
            "smtp": {
                "server": "smtp.example.com",
                "username": "me@example.com"
            }"#,
        );
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("smtp.password"));
    }

    #[test]
    fn test_telegram_without_token_source_rejected() {
        let json = minimal_config(
            r#",
            "telegram": { "chatId": "1234" }"#,
        );
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("telegram.botToken"));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let json = minimal_config("").replace(
            r#""llm": { "provider": "ollama" }"#,
            r#""llm": { "provider": "ollama", "maxRequestsPerWindow": 0 }"#,
        );
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("maxRequestsPerWindow"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/path/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
