//! Validation of endpoint targets and probe settings.
//!
//! Everything here runs once at startup so a bad configuration fails
//! before the first run instead of producing a misleading outage.

use anyhow::{anyhow, Result};
use url::Url;

/// Validate an HTTP/HTTPS endpoint URL
pub fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP endpoint: {}", other)),
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(anyhow!("URL has no host: {}", target));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(())
}

/// Validate port is in valid range
fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate the interval between runs
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    const MIN_INTERVAL: u64 = 10;
    const MAX_INTERVAL: u64 = 86400; // 24 hours

    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate the per-probe timeout
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 1;
    const MAX_TIMEOUT: u64 = 300; // 5 minutes

    if timeout_seconds < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {} seconds (minimum: {})",
            timeout_seconds,
            MIN_TIMEOUT
        ));
    }

    if timeout_seconds > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout_seconds,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}

/// Validate the number of probes allowed in flight at once
pub fn validate_concurrency(max_concurrency: usize) -> Result<()> {
    if max_concurrency == 0 {
        return Err(anyhow!("max_concurrency must be at least 1"));
    }
    Ok(())
}

/// A run deadline shorter than one probe timeout would cancel healthy probes
pub fn validate_run_deadline(deadline_seconds: u64, timeout_seconds: u64) -> Result<()> {
    if deadline_seconds < timeout_seconds {
        return Err(anyhow!(
            "Run deadline {} seconds is shorter than the probe timeout of {} seconds",
            deadline_seconds,
            timeout_seconds
        ));
    }
    Ok(())
}
