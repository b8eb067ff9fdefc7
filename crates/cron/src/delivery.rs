//! Delivery of task prompts to the configured webhook endpoint.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde_json::Value,
    tracing::{info, warn},
};

use crate::{Error, Result};

/// Default bound on a single delivery attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

/// Sends a due task's prompt somewhere. Implementations log failures and
/// never return them as errors; each attempt is made once.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, prompt: &str) -> DeliveryStatus;
}

/// POSTs `{"<payload_field>": prompt}` as JSON to a fixed URL.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: Option<String>,
    payload_field: String,
}

impl WebhookDelivery {
    pub fn new(
        url: Option<String>,
        timeout: Duration,
        payload_field: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external("failed to build webhook client", e))?;
        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            payload_field: payload_field.into(),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn post(&self, url: &str, prompt: &str) -> std::result::Result<u16, String> {
        let mut body = serde_json::Map::new();
        body.insert(self.payload_field.clone(), Value::String(prompt.to_string()));

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("endpoint returned HTTP {status}"));
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl Delivery for WebhookDelivery {
    async fn deliver(&self, prompt: &str) -> DeliveryStatus {
        let Some(url) = self.url.as_deref() else {
            warn!(prompt, "no delivery endpoint configured, dropping task");
            return DeliveryStatus::Failed;
        };
        match self.post(url, prompt).await {
            Ok(status) => {
                info!(prompt, status, "webhook triggered");
                DeliveryStatus::Delivered
            },
            Err(error) => {
                warn!(prompt, %error, "error triggering webhook");
                DeliveryStatus::Failed
            },
        }
    }
}
