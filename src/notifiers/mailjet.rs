use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::EmailTransport;
use crate::config::MailjetConfig;
use crate::utils::error::{AppError, Result};

/// Mailjet Send API v3.1.
pub struct MailjetTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<MessageStatus>,
}

#[derive(Debug, Deserialize)]
struct MessageStatus {
    #[serde(rename = "Status")]
    status: String,
}

impl MailjetTransport {
    pub fn new(config: &MailjetConfig, from_email: &str, from_name: &str) -> Result<Self> {
        let (api_key, api_secret) = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => (key.clone(), secret.clone()),
            _ => {
                return Err(AppError::Validation(
                    "Mailjet transport requires api_key and api_secret".into(),
                ))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Mailjet HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v3.1/send", config.api_base.trim_end_matches('/')),
            api_key,
            api_secret,
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        })
    }

    fn payload(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> serde_json::Value {
        json!({
            "Messages": [{
                "From": { "Email": self.from_email, "Name": self.from_name },
                "To": [{ "Email": to_email, "Name": to_name }],
                "Subject": subject,
                "HTMLPart": html_body,
                "CustomID": "PriceDropSummary"
            }]
        })
    }
}

#[async_trait]
impl EmailTransport for MailjetTransport {
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> Result<()> {
        let delivery_error = |message: String| AppError::Delivery {
            recipient: to_email.to_string(),
            message,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&self.payload(to_email, to_name, subject, html_body))
            .send()
            .await
            .map_err(|e| delivery_error(describe(e)))?
            .error_for_status()
            .map_err(|e| delivery_error(e.to_string()))?;

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| delivery_error(format!("unreadable Mailjet response: {}", describe(e))))?;

        match body.messages.first() {
            Some(message) if message.status == "success" => Ok(()),
            Some(message) => Err(delivery_error(format!("Mailjet status '{}'", message.status))),
            None => Err(delivery_error("Mailjet returned no message status".into())),
        }
    }
}

fn describe(err: reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Mailjet did not answer in time: {}", err)
    } else {
        err.to_string()
    }
}
