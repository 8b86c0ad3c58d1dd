use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::warn;

use crate::email::GatewayError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, message: SmsMessage) -> Result<(), GatewayError>;
}

/// SMS HTTP API client (JSON POST, bearer key, fixed sender id).
pub struct HttpSmsGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    sender_id: String,
}

impl HttpSmsGateway {
    pub fn new(api_url: String, api_key: SecretString, sender_id: String) -> Self {
        Self { client: reqwest::Client::new(), api_url, api_key, sender_id }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, message: SmsMessage) -> Result<(), GatewayError> {
        let payload = json!({
            "sender": self.sender_id,
            "to": message.to,
            "body": message.body,
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
            return Err(GatewayError::Rejected(format!("sms API returned {}", response.status())));
        }

        Ok(())
    }
}

/// Local-run stand-in: logs the would-be delivery and succeeds.
#[derive(Default)]
pub struct NoopSmsGateway;

#[async_trait]
impl SmsGateway for NoopSmsGateway {
    async fn send(&self, message: SmsMessage) -> Result<(), GatewayError> {
        warn!(
            event_name = "notify.sms.noop",
            to = %message.to,
            "sms gateway disabled; message dropped"
        );
        Ok(())
    }
}

/// Test double that records deliveries and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingSmsGateway {
    sent: Arc<Mutex<Vec<SmsMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingSmsGateway {
    pub fn sent(&self) -> Vec<SmsMessage> {
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
impl SmsGateway for RecordingSmsGateway {
    async fn send(&self, message: SmsMessage) -> Result<(), GatewayError> {
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
