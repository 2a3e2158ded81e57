//! Secret resolution and at-rest cookie encryption.
//!
//! Secrets (API keys, SMTP passwords, the Telegram bot token, LinkedIn
//! credentials) can come from three sources, tried in priority order:
//!
//! 1. **Direct value** - quick local testing (e.g. `"apiKey": "sk-..."`)
//! 2. **File reference** - Docker secrets pattern (e.g. `"apiKeyFile": "/run/secrets/llm"`)
//! 3. **Env var reference** - production (e.g. `"apiKeyEnvVar": "LLM_API_KEY"`)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use secrecy::SecretString;
use std::fs;

/// Failures while resolving a secret or handling the cookie jar key.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need a direct value, a file path, or an env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Treats empty strings as "not provided" so a partially filled config
/// section falls through to the next source.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Resolves a secret from the three sources in priority order:
/// direct value, then file contents, then environment variable.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = non_empty(direct) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = non_empty(file_path) {
        let expanded = expand_home(path);
        let content =
            fs::read_to_string(&expanded).map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            })?;
        return Ok(SecretString::from(content.trim().to_string()));
    }

    if let Some(name) = non_empty(env_var) {
        return match std::env::var(name) {
            // Shell exports sometimes carry trailing newlines.
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing source yields `None` instead of
/// an error. For optional secrets (e.g. Telegram token when Telegram
/// dispatch is unused).
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether at least one secret source is configured (non-empty). Config
/// validation uses this to reject sections that could never resolve.
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    [direct, file_path, env_var]
        .into_iter()
        .any(|source| non_empty(source).is_some())
}

/// Expands `~` to the user's home directory (HOME, then USERPROFILE).
///
/// Only `~` and `~/path` are supported; `~user/path` is not.
pub fn expand_home(path: &str) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        return path.to_string();
    }
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

// ============================================
// Cookie Encryption
// ============================================

/// Encryption key environment variable name.
pub const COOKIE_KEY_ENV_VAR: &str = "JOBHOUND_COOKIE_KEY";

/// Nonce size for AES-256-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Encrypts the persisted LinkedIn session cookies using AES-256-GCM.
///
/// The session cookie is as good as the account password, so the cookie
/// file is never written in the clear. The key comes from the
/// `JOBHOUND_COOKIE_KEY` environment variable as a 64-character hex string
/// (32 bytes).
pub struct CookieCipher {
    cipher: Aes256Gcm,
}

impl CookieCipher {
    /// Creates a cipher from the `JOBHOUND_COOKIE_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key_hex = std::env::var(COOKIE_KEY_ENV_VAR).map_err(|_| {
            SecretError::InvalidKey(format!(
                "Environment variable {} not set",
                COOKIE_KEY_ENV_VAR
            ))
        })?;

        Self::from_hex_key(&key_hex)
    }

    /// Creates a cipher from a 64-character hex key (32 bytes decoded).
    pub fn from_hex_key(key_hex: &str) -> Result<Self> {
        let key_bytes = hex_decode(key_hex)
            .map_err(|e| SecretError::InvalidKey(format!("Invalid hex key: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(SecretError::InvalidKey(format!(
                "Key must be 32 bytes (64 hex chars), got {} bytes",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| SecretError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypts plaintext, returning hex of `<12-byte nonce><ciphertext>`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes = rand_bytes::<NONCE_SIZE>()?;
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| SecretError::EncryptionError(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + sealed.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&sealed);

        Ok(hex_encode(&payload))
    }

    /// Decrypts hex-encoded ciphertext produced by [`Self::encrypt`].
    pub fn decrypt(&self, ciphertext_hex: &str) -> Result<String> {
        let payload = hex_decode(ciphertext_hex)
            .map_err(|e| SecretError::DecryptionError(format!("Invalid hex: {}", e)))?;

        if payload.len() < NONCE_SIZE {
            return Err(SecretError::DecryptionError(
                "Ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, sealed) = payload.split_at(NONCE_SIZE);
        let plaintext_bytes = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|e| SecretError::DecryptionError(e.to_string()))?;

        String::from_utf8(plaintext_bytes)
            .map_err(|e| SecretError::DecryptionError(format!("Invalid UTF-8: {}", e)))
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Decodes a hex string to bytes.
fn hex_decode(hex: &str) -> std::result::Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("hex input must have even length".to_string());
    }

    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits =
                std::str::from_utf8(pair).map_err(|_| "non-ASCII hex input".to_string())?;
            u8::from_str_radix(digits, 16)
                .map_err(|e| format!("invalid hex byte '{digits}': {e}"))
        })
        .collect()
}

/// Fills a fixed-size buffer from the system RNG.
fn rand_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).map_err(|e| {
        SecretError::EncryptionError(format!("Failed to generate random bytes: {}", e))
    })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn secret_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn resolved(direct: Option<&str>, file: Option<&str>, env: Option<&str>) -> String {
        resolve_secret(direct, file, env)
            .unwrap()
            .expose_secret()
            .to_string()
    }

    // Tests that touch environment variables run serially.
    #[test]
    #[serial]
    fn test_direct_value_beats_file_and_env() {
        let file = secret_file("from-file");
        std::env::set_var("JH_TEST_PRIO", "from-env");
        let value = resolved(
            Some("inline-token"),
            file.path().to_str(),
            Some("JH_TEST_PRIO"),
        );
        std::env::remove_var("JH_TEST_PRIO");
        assert_eq!(value, "inline-token");
    }

    #[test]
    #[serial]
    fn test_file_beats_env() {
        let file = secret_file("smtp-app-password\n");
        std::env::set_var("JH_TEST_FILE_PRIO", "from-env");
        let value = resolved(None, file.path().to_str(), Some("JH_TEST_FILE_PRIO"));
        std::env::remove_var("JH_TEST_FILE_PRIO");
        assert_eq!(value, "smtp-app-password");
    }

    #[test]
    #[serial]
    fn test_env_var_is_the_last_resort() {
        std::env::set_var("JH_TEST_ENV_ONLY", "bot-token-123\n");
        let value = resolved(None, None, Some("JH_TEST_ENV_ONLY"));
        std::env::remove_var("JH_TEST_ENV_ONLY");
        // Trailing newline from a shell export is trimmed.
        assert_eq!(value, "bot-token-123");
    }

    #[test]
    #[serial]
    fn test_empty_sources_fall_through() {
        std::env::set_var("JH_TEST_FALLTHROUGH", "reached-env");
        let value = resolved(Some(""), Some(""), Some("JH_TEST_FALLTHROUGH"));
        std::env::remove_var("JH_TEST_FALLTHROUGH");
        assert_eq!(value, "reached-env");
    }

    #[test]
    fn test_resolution_errors() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(None, Some("/nonexistent/path/to/secret"), None),
            Err(SecretError::FileReadError { .. })
        ));
        assert!(matches!(
            resolve_secret(None, None, Some("JH_DEFINITELY_NOT_SET_98765")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_file_content_is_trimmed() {
        let file = secret_file("  padded-secret  \n");
        let value = resolved(None, file.path().to_str(), None);
        assert_eq!(value, "padded-secret");
    }

    #[test]
    fn test_has_secret_source() {
        assert!(has_secret_source(None, None, Some("SOME_VAR")));
        assert!(has_secret_source(None, Some("/run/secrets/x"), None));
        assert!(has_secret_source(Some("inline"), None, None));
        assert!(!has_secret_source(Some(""), Some(""), Some("")));
        assert!(!has_secret_source(None, None, None));
    }

    #[test]
    #[serial]
    fn test_optional_variant_maps_missing_to_none() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());

        std::env::set_var("JH_TEST_OPTIONAL", "present");
        let secret = resolve_secret_optional(None, None, Some("JH_TEST_OPTIONAL")).unwrap();
        std::env::remove_var("JH_TEST_OPTIONAL");
        assert_eq!(secret.unwrap().expose_secret(), "present");

        // Other failures still surface.
        let err = resolve_secret_optional(None, Some("/nonexistent/secret"), None);
        assert!(matches!(err, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/jobhound/key"), "/etc/jobhound/key");
        assert_eq!(expand_home("cookies.enc"), "cookies.enc");
        assert_eq!(expand_home("~other/file"), "~other/file");

        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_home("~/.jobhound"), format!("{home}/.jobhound"));
            assert_eq!(expand_home("~"), home);
        }
    }

    // ============================================
    // Cookie Encryption Tests
    // ============================================

    // Test key: 32 bytes = 64 hex chars
    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_cookie_cipher_roundtrip() {
        let cipher = CookieCipher::from_hex_key(TEST_KEY).unwrap();
        let plaintext = r#"[{"name":"li_at","value":"AQEDAxyz"}]"#;

        let ciphertext = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_cookie_cipher_different_ciphertext_each_time() {
        let cipher = CookieCipher::from_hex_key(TEST_KEY).unwrap();
        let plaintext = "same-plaintext";

        let ciphertext1 = cipher.encrypt(plaintext).unwrap();
        let ciphertext2 = cipher.encrypt(plaintext).unwrap();

        // Random nonce means equal plaintexts never share ciphertext.
        assert_ne!(ciphertext1, ciphertext2);

        assert_eq!(cipher.decrypt(&ciphertext1).unwrap(), plaintext);
        assert_eq!(cipher.decrypt(&ciphertext2).unwrap(), plaintext);
    }

    #[test]
    fn test_cookie_cipher_invalid_key_length() {
        let result = CookieCipher::from_hex_key("0123456789abcdef");
        assert!(matches!(result, Err(SecretError::InvalidKey(_))));

        let result = CookieCipher::from_hex_key(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef00",
        );
        assert!(matches!(result, Err(SecretError::InvalidKey(_))));
    }

    #[test]
    fn test_cookie_cipher_invalid_hex_key() {
        let result = CookieCipher::from_hex_key("not-valid-hex-string-at-all!!!!!");
        assert!(matches!(result, Err(SecretError::InvalidKey(_))));
    }

    #[test]
    fn test_cookie_cipher_decrypt_invalid_ciphertext() {
        let cipher = CookieCipher::from_hex_key(TEST_KEY).unwrap();

        let result = cipher.decrypt("not-hex!");
        assert!(matches!(result, Err(SecretError::DecryptionError(_))));

        // Shorter than the nonce.
        let result = cipher.decrypt("aabbccdd");
        assert!(matches!(result, Err(SecretError::DecryptionError(_))));

        // Valid hex but tampered ciphertext.
        let ciphertext = cipher.encrypt("test").unwrap();
        let mut tampered = hex_decode(&ciphertext).unwrap();
        if let Some(byte) = tampered.last_mut() {
            *byte ^= 0xff;
        }
        let tampered_hex = hex_encode(&tampered);
        let result = cipher.decrypt(&tampered_hex);
        assert!(matches!(result, Err(SecretError::DecryptionError(_))));
    }

    #[test]
    fn test_hex_encode_decode_roundtrip() {
        let original = vec![0xde, 0xad, 0x00, 0x0f, 0xf0, 0xbe, 0xef];
        let encoded = hex_encode(&original);
        assert_eq!(encoded, "dead000ff0beef");
        assert_eq!(hex_decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_hex_decode_errors() {
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("ghij").is_err());
        // Multibyte chars split across chunk boundaries are not valid hex.
        assert!(hex_decode("🦀🦀").is_err());
    }

    #[test]
    fn test_cookie_cipher_unicode_plaintext() {
        let cipher = CookieCipher::from_hex_key(TEST_KEY).unwrap();
        let plaintext = "cookies with ünïcödé 🍪";

        let ciphertext = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }
}
