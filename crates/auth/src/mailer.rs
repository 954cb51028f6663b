//! Outgoing email for verification codes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_config::MailConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log. Used when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "mail provider not configured, logging message instead"
        );
        Ok(())
    }
}

/// Sends mail through an HTTP email API using a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .user_agent("campus-hub-backend")
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let payload = OutgoingMail {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            text: &message.body,
        };

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %message.to, "mail accepted by provider");
        Ok(())
    }
}

/// Pick the provider-backed mailer when `api_url` is set, otherwise log mail.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.api_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            let mailer = HttpMailer::new(
                url,
                config.api_key.clone(),
                config.from_address.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?;
            info!(
                provider = %url,
                timeout_seconds = config.timeout_seconds,
                "using http mail provider"
            );
            Ok(Arc::new(mailer))
        }
        _ => Ok(Arc::new(LogMailer)),
    }
}

pub(crate) fn verification_message(to: &str, code: &str, ttl_minutes: i64) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Your Campus Hub verification code".to_string(),
        body: format!(
            "Your verification code is {code}. It expires in {ttl_minutes} minutes.\n\n\
             If you did not create a Campus Hub account you can ignore this message."
        ),
    }
}
