//! LinkedIn feed scraper.
//!
//! Drives one WebDriver session per run: restore the stored session (or
//! log in with credentials and persist it), open the configured search
//! page, scroll until the feed stops growing, then harvest post text,
//! permalink, and a per-post screenshot.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::secrets::{expand_home, CookieCipher};

use super::webdriver::{ElementRef, WebDriverClient};
use super::{PostSource, ScrapeError, ScrapedPost};

/// Feed post containers on the search page.
const POST_SELECTOR: &str = ".fie-impression-container";
/// Per-post "see more" toggle.
const SEE_MORE_SELECTOR: &str =
    ".feed-shared-inline-show-more-text__see-more-less-toggle > span";
/// Author link nested in the post header.
const AUTHOR_LINK_SELECTOR: &str = "div > div > div > a";

const ELEMENT_WAIT: Duration = Duration::from_secs(15);
const LOGIN_WAIT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Settle time after the scroll loop, before collecting containers.
const SCROLL_SETTLE: Duration = Duration::from_secs(5);

/// Scrapes posts from the configured LinkedIn search or feed page.
pub struct LinkedInScraper {
    config: ScraperConfig,
    cookie_store: CookieStore,
}

impl LinkedInScraper {
    /// Without a cipher the scraper still runs, but sessions are never
    /// persisted and every run needs credentials.
    pub fn new(config: ScraperConfig, cipher: Option<CookieCipher>) -> Self {
        let cookie_store = CookieStore::new(&config.cookie_file, cipher);
        Self {
            config,
            cookie_store,
        }
    }

    /// Logs in, preferring the stored session over the login form.
    async fn login(&self, driver: &WebDriverClient) -> Result<(), ScrapeError> {
        driver.navigate(&self.config.login_url).await?;

        if let Some(cookies) = self.cookie_store.load() {
            debug!(count = cookies.len(), "Restoring stored session cookies");
            for cookie in &cookies {
                // Drivers reject some cookie fields; a partial restore
                // still logs in as long as the session cookie lands.
                if let Err(e) = driver.add_cookie(cookie).await {
                    debug!(error = %e, "Cookie rejected by driver");
                }
            }
            driver.refresh().await?;
            if driver.current_url().await?.contains("feed") {
                info!("Logged in from stored session");
                return Ok(());
            }
            info!("Stored session expired, logging in with credentials");
        }

        if !self.config.has_credentials() {
            return Err(ScrapeError::LoginFailed(
                "no stored session and no credentials configured".to_string(),
            ));
        }
        let username = self.config.resolve_username()?;
        let password = self.config.resolve_password()?;

        let field = self.wait_for_element(driver, "#username", ELEMENT_WAIT).await?;
        driver.send_keys(&field, username.expose_secret()).await?;
        let field = self.wait_for_element(driver, "#password", ELEMENT_WAIT).await?;
        driver.send_keys(&field, password.expose_secret()).await?;
        let submit = self
            .wait_for_element(driver, "button[type='submit']", ELEMENT_WAIT)
            .await?;
        driver.click(&submit).await?;

        let url = self
            .wait_for_url(driver, &["feed", "checkpoint/challenge"], LOGIN_WAIT)
            .await?;
        if url.contains("checkpoint/challenge") {
            return Err(ScrapeError::LoginFailed(
                "account verification challenge, complete one manual login first".to_string(),
            ));
        }

        let cookies = driver.cookies().await?;
        self.cookie_store.save(&cookies)?;
        info!("Login successful");
        Ok(())
    }

    async fn collect_posts(
        &self,
        driver: &WebDriverClient,
    ) -> Result<Vec<ScrapedPost>, ScrapeError> {
        driver.navigate(&self.config.search_url).await?;
        self.scroll_feed(driver).await?;
        sleep(SCROLL_SETTLE).await;

        let containers = driver.find_elements(POST_SELECTOR).await?;
        info!(
            found = containers.len(),
            cap = self.config.max_posts,
            "Post containers located"
        );

        let mut posts = Vec::new();
        for container in containers.into_iter().take(self.config.max_posts) {
            let url = self.post_url(driver, &container).await;
            self.expand_post(driver, &container).await;
            let text = driver.element_text(&container).await?;
            let screenshot_png = self.capture(driver, &container).await;
            debug!(chars = text.len(), url = url.as_deref().unwrap_or(""), "Post harvested");
            posts.push(ScrapedPost {
                text,
                screenshot_png,
                url,
            });
        }
        Ok(posts)
    }

    /// Scrolls to the bottom until the page height stops growing or the
    /// scroll cap is reached.
    async fn scroll_feed(&self, driver: &WebDriverClient) -> Result<(), ScrapeError> {
        let pause = Duration::from_secs(self.config.scroll_pause_secs);
        let mut last_height = page_height(driver).await?;
        for _ in 0..self.config.max_scrolls {
            driver
                .execute_script("window.scrollTo(0, document.body.scrollHeight);", &[])
                .await?;
            sleep(pause).await;
            let new_height = page_height(driver).await?;
            if new_height == last_height {
                break;
            }
            last_height = new_height;
        }
        Ok(())
    }

    /// Clicks the "see more" toggle so `element_text` sees the full post.
    /// Short posts have no toggle; lookup and click failures are ignored.
    async fn expand_post(&self, driver: &WebDriverClient, post: &ElementRef) {
        match driver.find_elements_within(post, SEE_MORE_SELECTOR).await {
            Ok(toggles) => {
                if let Some(toggle) = toggles.first() {
                    if let Err(e) = driver
                        .execute_script("arguments[0].click();", &[toggle])
                        .await
                    {
                        debug!(error = %e, "See-more toggle click failed");
                    }
                }
            }
            Err(e) => debug!(error = %e, "See-more toggle lookup failed"),
        }
    }

    /// Resolves the author link into a permalink worth storing. Posts
    /// without a resolvable link are still harvested.
    async fn post_url(&self, driver: &WebDriverClient, post: &ElementRef) -> Option<String> {
        let link = driver
            .find_elements_within(post, AUTHOR_LINK_SELECTOR)
            .await
            .ok()?
            .into_iter()
            .next()?;
        let href = driver.element_attribute(&link, "href").await.ok()??;
        Some(clean_post_url(&href))
    }

    /// Per-post screenshot, falling back to the viewport when the element
    /// capture fails. A post without a screenshot is still ingested.
    async fn capture(&self, driver: &WebDriverClient, post: &ElementRef) -> Option<Vec<u8>> {
        match driver.element_screenshot(post).await {
            Ok(png) => Some(png),
            Err(e) => {
                debug!(error = %e, "Element screenshot failed, capturing viewport");
                match driver.screenshot().await {
                    Ok(png) => Some(png),
                    Err(e) => {
                        warn!(error = %e, "Screenshot capture failed");
                        None
                    }
                }
            }
        }
    }

    async fn wait_for_element(
        &self,
        driver: &WebDriverClient,
        css: &str,
        timeout: Duration,
    ) -> Result<ElementRef, ScrapeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = driver.find_elements(css).await?.into_iter().next() {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::WaitTimeout(format!("element '{css}'")));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_url(
        &self,
        driver: &WebDriverClient,
        needles: &[&str],
        timeout: Duration,
    ) -> Result<String, ScrapeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let url = driver.current_url().await?;
            if needles.iter().any(|needle| url.contains(needle)) {
                return Ok(url);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::WaitTimeout(format!(
                    "url containing one of {needles:?}"
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PostSource for LinkedInScraper {
    async fn collect(&self) -> Result<Vec<ScrapedPost>, ScrapeError> {
        let driver = WebDriverClient::start_session(&self.config.webdriver_url).await?;

        let result = async {
            self.login(&driver).await?;
            self.collect_posts(&driver).await
        }
        .await;

        // A close failure must not shadow the scrape result.
        if let Err(e) = driver.close_session().await {
            warn!(error = %e, "Failed to close WebDriver session");
        }

        result
    }
}

async fn page_height(driver: &WebDriverClient) -> Result<i64, ScrapeError> {
    let value = driver
        .execute_script("return document.body.scrollHeight", &[])
        .await?;
    value.as_i64().ok_or_else(|| {
        ScrapeError::UnexpectedResponse("scrollHeight is not a number".to_string())
    })
}

/// Normalizes an author href: strip the query string, and point member
/// profiles at their activity feed (company and showcase pages already
/// list posts directly).
fn clean_post_url(href: &str) -> String {
    let clean = href.split('?').next().unwrap_or(href);
    if clean.contains("company") || clean.contains("showcase") {
        clean.to_string()
    } else {
        format!("{}/recent-activity/all/", clean.trim_end_matches('/'))
    }
}

/// Encrypted cookie jar on disk.
///
/// The session cookie is as good as the account password, so the jar is
/// never written in the clear. Without a cipher nothing is persisted.
struct CookieStore {
    path: PathBuf,
    cipher: Option<CookieCipher>,
}

impl CookieStore {
    fn new(path: &str, cipher: Option<CookieCipher>) -> Self {
        Self {
            path: PathBuf::from(expand_home(path)),
            cipher,
        }
    }

    /// Loads stored cookies. A missing file, missing key, or an
    /// undecryptable jar all mean "no stored session".
    fn load(&self) -> Option<Vec<Value>> {
        let cipher = self.cipher.as_ref()?;
        if !self.path.exists() {
            return None;
        }

        let encrypted = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cookie jar");
                return None;
            }
        };
        let plaintext = match cipher.decrypt(encrypted.trim()) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to decrypt cookie jar, falling back to credential login"
                );
                return None;
            }
        };
        match serde_json::from_str::<Vec<Value>>(&plaintext) {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                warn!(error = %e, "Cookie jar held malformed JSON");
                None
            }
        }
    }

    fn save(&self, cookies: &[Value]) -> Result<(), ScrapeError> {
        let Some(cipher) = &self.cipher else {
            warn!("No cookie encryption key, session not persisted");
            return Ok(());
        };

        let plaintext =
            serde_json::to_string(cookies).map_err(|e| ScrapeError::CookieStore {
                path: self.path.clone(),
                message: format!("failed to serialize cookies: {e}"),
            })?;
        let encrypted = cipher.encrypt(&plaintext).map_err(|e| ScrapeError::CookieStore {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScrapeError::CookieStore {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&self.path, encrypted).map_err(|e| ScrapeError::CookieStore {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        info!(path = %self.path.display(), count = cookies.len(), "Session cookies persisted");
        Ok(())
    }
}
