pub mod smtp;

use async_trait::async_trait;

use crate::app::Result;

pub use smtp::SmtpMailer;

/// A single digest message with plaintext and HTML alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer {
    /// Returns once the message has been accepted for delivery.
    async fn send(&self, email: &Email) -> Result<()>;
}
