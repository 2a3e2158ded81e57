//! Minimal W3C WebDriver client (JSON over HTTP).
//!
//! Implements exactly the commands the scraper needs (session lifecycle,
//! navigation, element lookup and interaction, script execution,
//! screenshots, cookies) against a remote Selenium or chromedriver
//! endpoint. Not a general-purpose binding.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::ScrapeError;

/// W3C element identifier key inside element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Page loads on a feed can be slow; commands get a generous ceiling.
const COMMAND_TIMEOUT_SECS: u64 = 90;

/// Opaque reference to an element within the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    /// Wire representation for use in `execute_script` arguments.
    fn to_wire(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

/// Handle to one remote WebDriver session.
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    /// Opens a new session against the endpoint (e.g.
    /// `http://localhost:4444/wd/hub`).
    pub async fn start_session(base_url: &str) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--no-sandbox", "--disable-dev-shm-usage"]
                    }
                }
            }
        });

        let url = format!("{}/session", base_url);
        let value = send_command(&client, Method::POST, &url, Some(&capabilities)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ScrapeError::UnexpectedResponse("session response missing sessionId".to_string())
            })?
            .to_string();

        debug!(session_id = %session_id, "WebDriver session started");
        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    /// Ends the session. Callers close explicitly so a failure surfaces
    /// as a warning instead of disappearing in a drop path.
    pub async fn close_session(self) -> Result<(), ScrapeError> {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        send_command(&self.client, Method::DELETE, &url, None).await?;
        debug!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, ScrapeError> {
        let value = self.command(Method::GET, "url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::UnexpectedResponse("url is not a string".to_string()))
    }

    pub async fn refresh(&self) -> Result<(), ScrapeError> {
        self.command(Method::POST, "refresh", Some(json!({}))).await?;
        Ok(())
    }

    /// Finds all elements matching a CSS selector.
    pub async fn find_elements(&self, css: &str) -> Result<Vec<ElementRef>, ScrapeError> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        parse_element_list(&value)
    }

    /// Finds elements matching a CSS selector under `root`.
    pub async fn find_elements_within(
        &self,
        root: &ElementRef,
        css: &str,
    ) -> Result<Vec<ElementRef>, ScrapeError> {
        let value = self
            .command(
                Method::POST,
                &format!("element/{}/elements", root.0),
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        parse_element_list(&value)
    }

    /// Visible text of an element, including its expanded children.
    pub async fn element_text(&self, element: &ElementRef) -> Result<String, ScrapeError> {
        let value = self
            .command(Method::GET, &format!("element/{}/text", element.0), None)
            .await?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            ScrapeError::UnexpectedResponse("element text is not a string".to_string())
        })
    }

    /// Attribute value, or `None` when the attribute is absent.
    pub async fn element_attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, ScrapeError> {
        let value = self
            .command(
                Method::GET,
                &format!("element/{}/attribute/{}", element.0, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn click(&self, element: &ElementRef) -> Result<(), ScrapeError> {
        self.command(
            Method::POST,
            &format!("element/{}/click", element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Types text into an element (e.g. a login field).
    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), ScrapeError> {
        self.command(
            Method::POST,
            &format!("element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Executes synchronous JavaScript, returning its JSON result.
    pub async fn execute_script(
        &self,
        script: &str,
        args: &[&ElementRef],
    ) -> Result<Value, ScrapeError> {
        let args: Vec<Value> = args.iter().map(|e| e.to_wire()).collect();
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// PNG screenshot of the current viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>, ScrapeError> {
        let value = self.command(Method::GET, "screenshot", None).await?;
        decode_screenshot(&value)
    }

    /// PNG screenshot cropped to one element.
    pub async fn element_screenshot(&self, element: &ElementRef) -> Result<Vec<u8>, ScrapeError> {
        let value = self
            .command(
                Method::GET,
                &format!("element/{}/screenshot", element.0),
                None,
            )
            .await?;
        decode_screenshot(&value)
    }

    /// All cookies visible to the current page.
    pub async fn cookies(&self) -> Result<Vec<Value>, ScrapeError> {
        let value = self.command(Method::GET, "cookie", None).await?;
        value.as_array().cloned().ok_or_else(|| {
            ScrapeError::UnexpectedResponse("cookie response is not an array".to_string())
        })
    }

    /// Adds one cookie to the current page's domain.
    pub async fn add_cookie(&self, cookie: &Value) -> Result<(), ScrapeError> {
        self.command(Method::POST, "cookie", Some(json!({ "cookie": cookie })))
            .await?;
        Ok(())
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ScrapeError> {
        let url = format!("{}/session/{}/{}", self.base_url, self.session_id, path);
        send_command(&self.client, method, &url, body.as_ref()).await
    }
}

async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> Result<Value, ScrapeError> {
    let mut builder = client.request(method, url);
    if let Some(body) = body {
        builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let wire: WireResponse = response.json().await?;

    if !status.is_success() {
        return Err(wire_error(&wire.value));
    }
    Ok(wire.value)
}

/// Maps a W3C error payload (`{"error": ..., "message": ...}`) to a
/// typed command failure.
fn wire_error(value: &Value) -> ScrapeError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ScrapeError::Command { error, message }
}

fn parse_element_list(value: &Value) -> Result<Vec<ElementRef>, ScrapeError> {
    let array = value.as_array().ok_or_else(|| {
        ScrapeError::UnexpectedResponse("element response is not an array".to_string())
    })?;

    array
        .iter()
        .map(|entry| {
            entry
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| ElementRef(id.to_string()))
                .ok_or_else(|| {
                    ScrapeError::UnexpectedResponse(
                        "element entry missing W3C identifier".to_string(),
                    )
                })
        })
        .collect()
}

fn decode_screenshot(value: &Value) -> Result<Vec<u8>, ScrapeError> {
    let encoded = value.as_str().ok_or_else(|| {
        ScrapeError::UnexpectedResponse("screenshot response is not a string".to_string())
    })?;
    Ok(BASE64.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_element_list() {
        let value = json!([
            { ELEMENT_KEY: "elem-1" },
            { ELEMENT_KEY: "elem-2" }
        ]);
        let elements = parse_element_list(&value).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0], ElementRef("elem-1".to_string()));
    }

    #[test]
    fn test_parse_element_list_rejects_non_array() {
        let value = json!({ "oops": true });
        assert!(matches!(
            parse_element_list(&value),
            Err(ScrapeError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_element_list_rejects_missing_key() {
        let value = json!([{ "not-the-key": "elem-1" }]);
        assert!(matches!(
            parse_element_list(&value),
            Err(ScrapeError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_wire_error_extracts_fields() {
        let value = json!({
            "error": "no such element",
            "message": "Unable to locate element: #username",
            "stacktrace": "..."
        });
        let err = wire_error(&value);
        match err {
            ScrapeError::Command { error, message } => {
                assert_eq!(error, "no such element");
                assert!(message.contains("#username"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wire_error_tolerates_bare_payload() {
        let err = wire_error(&Value::Null);
        match err {
            ScrapeError::Command { error, .. } => assert_eq!(error, "unknown error"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_screenshot_roundtrip() {
        let png = vec![0x89, 0x50, 0x4E, 0x47];
        let value = Value::String(BASE64.encode(&png));
        assert_eq!(decode_screenshot(&value).unwrap(), png);
    }

    #[test]
    fn test_decode_screenshot_rejects_invalid_base64() {
        let value = Value::String("not base64 !!!".to_string());
        assert!(matches!(
            decode_screenshot(&value),
            Err(ScrapeError::ScreenshotDecode(_))
        ));
    }

    #[test]
    fn test_element_wire_representation() {
        let element = ElementRef("abc-123".to_string());
        assert_eq!(element.to_wire(), json!({ ELEMENT_KEY: "abc-123" }));
    }
}
