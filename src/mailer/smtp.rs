use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::app::{ChirpError, Result};
use crate::config::{ConfigError, SmtpConfig};
use crate::mailer::{Email, Mailer};

/// Sends through an SMTP server: a plain local relay by default, or a
/// STARTTLS relay when credentials are configured.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| ChirpError::Send(format!("SMTP relay {}: {}", config.host, e)))?
                    .port(config.port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };

        Ok(Self {
            transport,
            host: config.host.clone(),
        })
    }

    fn build_message(email: &Email) -> Result<Message> {
        let from = parse_mailbox(&email.from).map_err(|e| ChirpError::Send(e.to_string()))?;
        let to = parse_mailbox(&email.to).map_err(|e| ChirpError::Send(e.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )
            .map_err(|e| ChirpError::Send(format!("Failed to build message: {}", e)))
    }
}

/// Parse an address the way the transport will, for startup validation.
pub fn parse_mailbox(address: &str) -> std::result::Result<Mailbox, ConfigError> {
    address.parse().map_err(|_| ConfigError::InvalidValue {
        key: "email address",
        value: address.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let message = Self::build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ChirpError::Send(format!("SMTP delivery via {} failed: {}", self.host, e)))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Digest email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            subject: "Recent posts".into(),
            from: "chirpmail@noreply.invalid".into(),
            to: "me@example.com".into(),
            text: "someone: hi".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[test]
    fn test_build_multipart_message() {
        let message = SmtpMailer::build_message(&email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Recent posts"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_invalid_recipient_is_send_error() {
        let mut bad = email();
        bad.to = "not an address".into();
        let err = SmtpMailer::build_message(&bad).unwrap_err();
        assert!(matches!(err, ChirpError::Send(_)));
    }

    #[test]
    fn test_parse_mailbox() {
        assert!(parse_mailbox("me@example.com").is_ok());
        assert!(matches!(
            parse_mailbox("nope"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_local_relay_transport_builds() {
        let config = SmtpConfig {
            host: "localhost".into(),
            port: 25,
            username: None,
            password: None,
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }
}
