// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP delivery of customer inquiries to the sales inbox.

use async_trait::async_trait;
use concierge_config::model::NotifyConfig;
use concierge_core::{AdapterType, ConciergeError, HealthStatus, Notifier, PluginAdapter};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, warn};

const IMPLICIT_TLS_PORT: u16 = 465;

fn notify_err(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> ConciergeError {
    ConciergeError::Notify {
        message: message.into(),
        source: Some(Box::new(source)),
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    host: String,
}

impl SmtpNotifier {
    /// Build from config. `Ok(None)` when no SMTP host is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, ConciergeError> {
        let Some(host) = config.smtp_host.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let from = parse_mailbox(config.from.as_deref(), "notify.from")?;
        let to = parse_mailbox(config.to.as_deref(), "notify.to")?;

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| notify_err(format!("invalid SMTP relay {host}"), e))?
        .port(config.smtp_port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        Ok(Some(Self {
            transport: builder.build(),
            from,
            to,
            host: host.to_string(),
        }))
    }

    /// The outgoing message and its Message-ID.
    pub fn build_message(
        &self,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<(Message, String), ConciergeError> {
        let message_id = format!("<{}@concierge>", uuid::Uuid::new_v4().simple());
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("New Inquiry from {name}"))
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_PLAIN);

        match email.trim().parse::<Address>() {
            Ok(address) => builder = builder.reply_to(Mailbox::new(Some(name.to_string()), address)),
            Err(e) => warn!(error = %e, "customer email unusable as reply-to"),
        }

        let body = format!("Name: {name}\nEmail: {email}\n\nMessage:\n{message}\n");
        let built = builder
            .body(body)
            .map_err(|e| notify_err("could not build inquiry email", e))?;
        Ok((built, message_id))
    }
}

fn parse_mailbox(value: Option<&str>, field: &str) -> Result<Mailbox, ConciergeError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConciergeError::Config(format!("{field} is required when notify.smtp_host is set")))?;
    raw.parse::<Mailbox>()
        .map_err(|e| ConciergeError::Config(format!("{field}: invalid address {raw:?}: {e}")))
}

#[async_trait]
impl PluginAdapter for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded(format!("{} did not accept NOOP", self.host))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, name: &str, email: &str, message: &str) -> Result<String, ConciergeError> {
        let (built, message_id) = self.build_message(name, email, message)?;
        let response = self
            .transport
            .send(built)
            .await
            .map_err(|e| notify_err(format!("SMTP delivery via {} failed", self.host), e))?;
        debug!(code = %response.code(), message_id = %message_id, "inquiry email accepted");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotifyConfig {
        NotifyConfig {
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: 587,
            username: Some("bot".into()),
            password: Some("secret".into()),
            from: Some("Concierge <bot@example.com>".into()),
            to: Some("sales@example.com".into()),
        }
    }

    #[test]
    fn absent_host_means_unconfigured() {
        assert!(SmtpNotifier::from_config(&NotifyConfig::default()).unwrap().is_none());
    }

    #[test]
    fn missing_recipient_is_a_config_error() {
        let mut c = config();
        c.to = None;
        let Err(err) = SmtpNotifier::from_config(&c) else {
            panic!("expected config error");
        };
        assert!(matches!(err, ConciergeError::Config(_)));
        assert!(err.to_string().contains("notify.to"));
    }

    #[tokio::test]
    async fn message_carries_subject_body_and_reply_to() {
        let notifier = SmtpNotifier::from_config(&config()).unwrap().unwrap();
        let (message, id) = notifier
            .build_message("Ana", "ana@example.com", "Need 500 totes")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: New Inquiry from Ana"));
        assert!(raw.contains("Reply-To: \"Ana\" <ana@example.com>") || raw.contains("Reply-To: Ana <ana@example.com>"));
        assert!(raw.contains("Need 500 totes"));
        assert!(raw.contains(&id));
    }

    #[tokio::test]
    async fn bad_customer_email_still_builds() {
        let notifier = SmtpNotifier::from_config(&config()).unwrap().unwrap();
        let (message, _) = notifier.build_message("Ana", "not an email", "hi").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(!raw.contains("Reply-To"));
    }
}
