//! Outbound channels: SMTP for vacancies with a recipient address,
//! Telegram for the rest.

pub mod smtp;
pub mod telegram;

use std::path::PathBuf;

use thiserror::Error;

pub use smtp::SmtpMailer;
pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to resolve dispatch credentials: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Invalid email address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build email message: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Failed to read attachment '{path}': {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error (status {status}): {message}")]
    Telegram { status: u16, message: String },

    #[error("Send task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
