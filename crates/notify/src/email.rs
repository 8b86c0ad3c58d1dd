use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(String),
    #[error("gateway rejected the message: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), GatewayError>;
}

/// Transactional-email HTTP API client (JSON POST, bearer key).
pub struct HttpEmailGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    from_address: String,
}

impl HttpEmailGateway {
    pub fn new(api_url: String, api_key: SecretString, from_address: String) -> Self {
        Self { client: reqwest::Client::new(), api_url, api_key, from_address }
    }
}

#[async_trait]
impl EmailGateway for HttpEmailGateway {
    async fn send(&self, message: EmailMessage) -> Result<(), GatewayError> {
        let payload = json!({
            "from": self.from_address,
            "to": message.to,
            "subject": message.subject,
            "html": message.html,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "email API returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Local-run stand-in: logs the would-be delivery and succeeds.
#[derive(Default)]
pub struct NoopEmailGateway;

#[async_trait]
impl EmailGateway for NoopEmailGateway {
    async fn send(&self, message: EmailMessage) -> Result<(), GatewayError> {
        warn!(
            event_name = "notify.email.noop",
            to = %message.to,
            subject = %message.subject,
            "email gateway disabled; message dropped"
        );
        Ok(())
    }
}

/// Test double that records deliveries and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingEmailGateway {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingEmailGateway {
    pub fn sent(&self) -> Vec<EmailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn fail_next_sends(&self, fail: bool) {
        match self.fail.lock() {
            Ok(mut flag) => *flag = fail,
            Err(poisoned) => *poisoned.into_inner() = fail,
        }
    }
}

#[async_trait]
impl EmailGateway for RecordingEmailGateway {
    async fn send(&self, message: EmailMessage) -> Result<(), GatewayError> {
        let failing = match self.fail.lock() {
            Ok(flag) => *flag,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if failing {
            return Err(GatewayError::Request("recording gateway forced failure".to_string()));
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}
