//! Outbound alert mail.

use async_trait::async_trait;
use fuelwatch_core::SmtpSettings;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::collaborators::Notifier;
use crate::error::DeliveryError;

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_owned(),
            reason: e.to_string(),
        })
}

/// Sends plain-text mail through an SMTP relay over implicit TLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidAddress`] if the sender address does
    /// not parse, or [`DeliveryError::Transport`] if the relay host is
    /// unusable.
    pub fn new(settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&settings.from_address)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(recipient)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .map_err(|e| DeliveryError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        tracing::info!(recipient, "alert mail sent");
        Ok(())
    }
}

/// Stand-in used when no SMTP relay is configured: every message is logged
/// and counted as delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        tracing::info!(recipient, subject, body, "SMTP not configured, logging alert instead");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(from: &str) -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_owned(),
            port: 465,
            username: "alerts@example.com".to_owned(),
            password: "secret".to_owned(),
            from_address: from.to_owned(),
        }
    }

    #[test]
    fn smtp_notifier_rejects_bad_sender() {
        let result = SmtpNotifier::new(&settings("not an address"));
        assert!(matches!(result, Err(DeliveryError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn smtp_notifier_rejects_bad_recipient_before_connecting() {
        let notifier = SmtpNotifier::new(&settings("alerts@example.com")).expect("valid settings");
        let err = notifier
            .send("nobody", "Fuel Price Alert", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send("u@x.com", "s", "b").await.is_ok());
    }
}
