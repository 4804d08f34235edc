use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::EmailTransport;
use crate::config::SmtpConfig;
use crate::utils::error::{AppError, Result};

pub struct SmtpEmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailTransport {
    pub fn new(config: &SmtpConfig, from_email: &str, from_name: &str) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Validation(format!("invalid SMTP host '{}': {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from: mailbox(from_email, from_name)?,
        })
    }

    fn build_message(&self, to: Mailbox, subject: &str, html_body: &str) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| AppError::Internal(format!("failed to build email: {}", e)))
    }
}

fn mailbox(email: &str, name: &str) -> Result<Mailbox> {
    let address = email
        .parse()
        .map_err(|e| AppError::Validation(format!("invalid email address '{}': {}", email, e)))?;
    let name = (!name.is_empty()).then(|| name.to_string());
    Ok(Mailbox::new(name, address))
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> Result<()> {
        let delivery_error = |message: String| AppError::Delivery {
            recipient: to_email.to_string(),
            message,
        };

        let to = mailbox(to_email, to_name).map_err(|e| delivery_error(e.to_string()))?;
        let message = self
            .build_message(to, subject, html_body)
            .map_err(|e| delivery_error(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| delivery_error(e.to_string()))?;
        Ok(())
    }
}
