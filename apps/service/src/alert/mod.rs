//! Alert delivery for runs that saw at least one state transition.
//!
//! One message per run, whatever the number of transitions. The body names
//! every endpoint that changed.

pub mod secrets;
pub mod webhook;

pub use secrets::{EnvSecretSource, FileSecretSource, SecretSource};
pub use webhook::WebhookTransport;

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AlertError;
use crate::monitoring::types::{StatusMap, TransitionSet, state_label};

/// Delivers a finished alert message
#[async_trait::async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, credential: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// A rendered alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    pub fn for_transitions(transitions: &TransitionSet, fresh: &StatusMap) -> Self {
        let subject = format!(
            "Alert notification: {} endpoint{} changed state",
            transitions.len(),
            if transitions.len() == 1 { "" } else { "s" }
        );

        let mut body = String::from("The following endpoints changed state since the previous run:\n\n");
        for (name, transition) in transitions.iter() {
            let _ = write!(
                body,
                "- {}: {} -> {}",
                name,
                state_label(transition.previous),
                state_label(transition.current)
            );
            if let Some(result) = fresh.get(name) {
                let tested_at: DateTime<Utc> = result.tested_at.into();
                let _ = write!(
                    body,
                    " ({}, status {}, {} ms, tested {})",
                    result.url,
                    result.status_code,
                    result.duration_millis(),
                    tested_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                );
                if !result.error_message.is_empty() {
                    let _ = write!(body, "\n    error: {}", result.error_message);
                }
            }
            body.push('\n');
        }

        Self { subject, body }
    }
}

/// Retrieves the credential and sends exactly one message per call
pub struct AlertDispatcher {
    transport: Arc<dyn AlertTransport>,
    secrets: Arc<dyn SecretSource>,
    secret_id: String,
}

impl AlertDispatcher {
    pub fn new(
        transport: Arc<dyn AlertTransport>,
        secrets: Arc<dyn SecretSource>,
        secret_id: impl Into<String>,
    ) -> Self {
        Self { transport, secrets, secret_id: secret_id.into() }
    }

    /// Send the run's alert; the caller only invokes this when `transitions` is non-empty
    pub async fn notify(&self, transitions: &TransitionSet, fresh: &StatusMap) -> Result<(), AlertError> {
        if transitions.is_empty() {
            warn!("Alert requested without any transitions, nothing sent");
            return Ok(());
        }

        // Looked up on every alert, never cached.
        let credential = self
            .secrets
            .get_secret(&self.secret_id)
            .await
            .map_err(|source| AlertError::Secret { id: self.secret_id.clone(), source })?;

        let message = AlertMessage::for_transitions(transitions, fresh);
        self.transport
            .send(&credential, &message.subject, &message.body)
            .await
            .map_err(AlertError::Transport)?;

        info!(transitions = transitions.len(), "Alert sent: {}", message.subject);
        Ok(())
    }
}
