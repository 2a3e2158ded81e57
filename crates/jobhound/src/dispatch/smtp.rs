//! Application emails over SMTP with the rendered resume attached.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::SmtpConfig;
use crate::dispatch::DispatchError;

/// Sends application emails through one configured STARTTLS relay.
///
/// Connections are opened per send; a run sends at most a handful of
/// emails, minutes apart.
pub struct SmtpMailer {
    server: String,
    port: u16,
    username: String,
    from: String,
    password: SecretString,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, DispatchError> {
        let password = config.resolve_password()?;
        Ok(Self {
            server: config.server.clone(),
            port: config.port,
            username: config.username.clone(),
            from: config.from_address().to_string(),
            password,
        })
    }

    /// Sends one email, attaching the file at `attachment` when given.
    /// The blocking SMTP exchange runs on the blocking pool.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<(), DispatchError> {
        let attachment = match attachment {
            Some(path) => {
                let bytes =
                    tokio::fs::read(path)
                        .await
                        .map_err(|source| DispatchError::Attachment {
                            path: path.to_path_buf(),
                            source,
                        })?;
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("resume.md")
                    .to_string();
                Some((filename, bytes, attachment_content_type(path)))
            }
            None => None,
        };

        let message = build_message(&self.from, recipient, subject, body, attachment)?;

        let server = self.server.clone();
        let port = self.port;
        let credentials = Credentials::new(
            self.username.clone(),
            self.password.expose_secret().to_string(),
        );

        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::starttls_relay(&server)?
                .port(port)
                .credentials(credentials)
                .build();
            transport.send(&message)
        })
        .await??;

        info!(recipient = %recipient, subject = %subject, "application email sent");
        Ok(())
    }
}

fn build_message(
    from: &str,
    recipient: &str,
    subject: &str,
    body: &str,
    attachment: Option<(String, Vec<u8>, ContentType)>,
) -> Result<Message, DispatchError> {
    let from: Mailbox = from.parse().map_err(|source| DispatchError::Address {
        address: from.to_string(),
        source,
    })?;
    let to: Mailbox = recipient.parse().map_err(|source| DispatchError::Address {
        address: recipient.to_string(),
        source,
    })?;

    let builder = Message::builder().from(from).to(to).subject(subject);

    let message = match attachment {
        Some((filename, bytes, content_type)) => builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body.to_string()))
                .singlepart(Attachment::new(filename).body(bytes, content_type)),
        )?,
        None => builder.header(ContentType::TEXT_PLAIN).body(body.to_string())?,
    };

    Ok(message)
}

fn attachment_content_type(path: &Path) -> ContentType {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    ContentType::parse(mime.essence_str()).unwrap_or(ContentType::TEXT_PLAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        let md = attachment_content_type(Path::new("resume_ab12.md"));
        assert_eq!(md, ContentType::parse("text/markdown").unwrap());

        let pdf = attachment_content_type(Path::new("resume.pdf"));
        assert_eq!(pdf, ContentType::parse("application/pdf").unwrap());

        let unknown = attachment_content_type(Path::new("resume.zzz"));
        assert_eq!(unknown, ContentType::parse("application/octet-stream").unwrap());
    }

    #[test]
    fn test_build_plain_message() {
        let message = build_message(
            "Jane Doe <jane@example.com>",
            "hiring@acme.example",
            "Application: Rust Engineer",
            "Hello,\n\nPlease find my resume attached.",
            None,
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Application: Rust Engineer"));
        assert!(raw.contains("To: hiring@acme.example"));
        assert!(raw.contains("Jane Doe"));
        assert!(raw.contains("<jane@example.com>"));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let message = build_message(
            "jane@example.com",
            "hiring@acme.example",
            "Application",
            "Body text.",
            Some((
                "resume_ab12.md".to_string(),
                b"# Resume".to_vec(),
                ContentType::parse("text/markdown").unwrap(),
            )),
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("resume_ab12.md"));
        assert!(raw.contains("text/markdown"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let err = build_message("jane@example.com", "not-an-address", "s", "b", None)
            .err()
            .unwrap();
        assert!(matches!(err, DispatchError::Address { .. }));
    }
}
