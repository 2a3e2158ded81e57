//! Post collection from a remote browser.
//!
//! The scraper drives an external Selenium/chromedriver endpoint over the
//! W3C WebDriver wire protocol (JSON over HTTP); no browser runs in this
//! process. The pipeline only sees the [`PostSource`] trait, so tests and
//! `--skip-scrape` runs never touch a live session.

pub mod linkedin;
pub mod webdriver;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use linkedin::LinkedInScraper;
pub use webdriver::{ElementRef, WebDriverClient};

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("WebDriver HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver command failed ({error}): {message}")]
    Command { error: String, message: String },

    #[error("Unexpected WebDriver response: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to decode screenshot data: {0}")]
    ScreenshotDecode(#[from] base64::DecodeError),

    #[error("Timed out waiting for {0}")]
    WaitTimeout(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Cookie store error at '{path}': {message}")]
    CookieStore { path: PathBuf, message: String },

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

/// One harvested post, ready for the duplicate filter.
#[derive(Debug, Clone)]
pub struct ScrapedPost {
    /// Full expanded post text.
    pub text: String,
    /// PNG capture of the post element, when one could be taken.
    pub screenshot_png: Option<Vec<u8>>,
    /// Permalink to the author's activity, when resolvable.
    pub url: Option<String>,
}

/// Seam between the pipeline and the live scraper.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Collects the posts for this run. A hard failure here aborts the
    /// run; there is nothing to process without input.
    async fn collect(&self) -> Result<Vec<ScrapedPost>, ScrapeError>;
}

/// Source that yields nothing. Backs `--skip-scrape` runs, which triage
/// and dispatch only what is already stored.
pub struct EmptySource;

#[async_trait]
impl PostSource for EmptySource {
    async fn collect(&self) -> Result<Vec<ScrapedPost>, ScrapeError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_source_yields_nothing() {
        let posts = EmptySource.collect().await.unwrap();
        assert!(posts.is_empty());
    }
}
