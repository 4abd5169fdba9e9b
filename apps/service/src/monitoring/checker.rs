use anyhow::Result;
use reqwest::StatusCode;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

use super::types::ProbeResult;
use crate::catalog::Endpoint;

/// Performs one health check against one endpoint
///
/// Implementations never fail: every failure mode is encoded in the
/// returned `ProbeResult` so a single bad endpoint cannot abort a run.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, endpoint: &Endpoint) -> ProbeResult;
}

/// HTTP GET checker; only an exact 200 counts as success
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("uppe-uptime/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, endpoint: &Endpoint) -> ProbeResult {
        let tested_at = SystemTime::now();
        let start = Instant::now();

        let mut response = match self.client.get(&endpoint.url).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = anyhow::Error::from(e);
                debug!(endpoint = %endpoint.name, "Probe got no response: {:#}", error);
                return ProbeResult::transport_failure(
                    endpoint,
                    format!("{error:#}"),
                    tested_at,
                    start.elapsed(),
                );
            }
        };

        let status = response.status();
        let drained = drain_body(&mut response).await;
        let duration = start.elapsed();

        let result = if status == StatusCode::OK {
            ProbeResult::success(endpoint, tested_at, duration)
        } else {
            ProbeResult::unexpected_status(
                endpoint,
                status.as_u16(),
                reason_phrase(status),
                tested_at,
                duration,
            )
        };

        match drained {
            Ok(bytes) => {
                debug!(
                    endpoint = %endpoint.name,
                    status = status.as_u16(),
                    bytes,
                    duration_ms = result.duration_millis(),
                    "Probe completed"
                );
                result
            }
            Err(e) => {
                let error = anyhow::Error::from(e);
                warn!(endpoint = %endpoint.name, "Failed to drain response body: {:#}", error);
                result.with_note(&format!("body read failed: {error:#}"))
            }
        }
    }
}

/// Read the body to the end so the connection can be reused; content is ignored
async fn drain_body(response: &mut reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut total = 0u64;
    while let Some(chunk) = response.chunk().await? {
        total += chunk.len() as u64;
    }
    Ok(total)
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
