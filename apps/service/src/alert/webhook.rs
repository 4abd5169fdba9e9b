use anyhow::{Result, anyhow};
use serde::Serialize;
use std::time::Duration;

use super::AlertTransport;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts the alert as JSON to an HTTP endpoint, authenticated with a bearer credential
///
/// Works with mail relays and chat bridges that accept a
/// `{recipient, subject, body}` document.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    recipient: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>, recipient: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into(), recipient: recipient.into() })
    }
}

#[async_trait::async_trait]
impl AlertTransport for WebhookTransport {
    async fn send(&self, credential: &str, subject: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload { recipient: &self.recipient, subject, body };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("alert webhook request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("alert webhook responded with status {}", status));
        }

        Ok(())
    }
}
