use async_trait::async_trait;

use super::EmailTransport;
use crate::utils::error::Result;

/// Writes outgoing mail to the log. Default transport until real credentials
/// are configured.
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> Result<()> {
        tracing::info!(to = %to_email, name = %to_name, subject = %subject, bytes = html_body.len(), "email not sent (log transport)");
        tracing::debug!(body = %html_body, "email body");
        Ok(())
    }
}
