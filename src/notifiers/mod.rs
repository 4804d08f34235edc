use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::config::{NotificationsConfig, TransportKind};
use crate::models::Recipient;
use crate::utils::error::Result;

pub mod composer;
pub mod email;
pub mod log;
pub mod mailjet;

pub use composer::{DropSummary, NotificationComposer, PriceDrop};
pub use email::SmtpEmailTransport;
pub use log::LogTransport;
pub use mailjet::MailjetTransport;

/// Outbound email. Credentials live in the implementation, never in callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> Result<()>;
}

pub fn build_transport(config: &NotificationsConfig) -> Result<Arc<dyn EmailTransport>> {
    let transport: Arc<dyn EmailTransport> = match config.transport {
        TransportKind::Smtp => Arc::new(SmtpEmailTransport::new(
            &config.smtp,
            &config.from_email,
            &config.from_name,
        )?),
        TransportKind::Mailjet => Arc::new(MailjetTransport::new(
            &config.mailjet,
            &config.from_email,
            &config.from_name,
        )?),
        TransportKind::Log => Arc::new(LogTransport),
    };
    Ok(transport)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fans a drop summary out to every recipient, one message each.
pub struct Notifier {
    transport: Arc<dyn EmailTransport>,
    subject: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn EmailTransport>, subject: impl Into<String>) -> Self {
        Self {
            transport,
            subject: subject.into(),
        }
    }

    /// Best effort: a failed delivery is logged and counted, the other
    /// recipients still get their message. Nothing is sent for an empty summary.
    pub async fn notify(&self, recipients: &[Recipient], summary: &DropSummary) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if !summary.has_drops() {
            return report;
        }

        let sends = recipients.iter().map(|recipient| async move {
            let result = self
                .transport
                .send(&recipient.email, &recipient.name, &self.subject, &summary.html)
                .await;
            (recipient, result)
        });

        for (recipient, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    tracing::info!(recipient = %recipient.email, drops = summary.drops.len(), "price drop email sent");
                    metrics::counter!("pricewatch_emails_total", "outcome" => "sent").increment(1);
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(recipient = %recipient.email, "price drop email failed: {}", e);
                    metrics::counter!("pricewatch_emails_total", "outcome" => "failed").increment(1);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
