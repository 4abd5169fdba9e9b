/// Orchestrator module - drives one complete run
///
/// A run is strictly sequential at this level:
/// - Load the prior snapshot for every catalog endpoint
/// - Probe all endpoints (concurrently, inside the runner)
/// - Diff fresh results against the prior snapshot
/// - Commit fresh state and history
/// - Send one alert when anything changed state
///
/// Only one run may be active at a time. The orchestrator does no locking
/// of its own; callers that trigger runs must serialize them.
pub mod persistence;


pub use persistence::Persistence;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::alert::{
    AlertDispatcher, AlertTransport, EnvSecretSource, FileSecretSource, SecretSource,
    WebhookTransport,
};
use crate::catalog::EndpointCatalog;
use crate::config::{Config, SecretSourceKind};
use crate::database::open_store;
use crate::error::RunError;
use crate::monitoring::{HttpChecker, Runner, StatusMap, TransitionSet};

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub fresh: StatusMap,
    pub transitions: TransitionSet,
    /// Failures after probing; the snapshot above is still valid
    pub errors: Vec<RunError>,
    pub alert_sent: bool,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.errors.first()
    }
}

/// Main orchestrator for the uptime service
pub struct Orchestrator {
    catalog: EndpointCatalog,
    runner: Runner,
    persistence: Persistence,
    alerts: Option<AlertDispatcher>,
}

impl Orchestrator {
    pub fn new(
        catalog: EndpointCatalog,
        runner: Runner,
        persistence: Persistence,
        alerts: Option<AlertDispatcher>,
    ) -> Self {
        Self { catalog, runner, persistence, alerts }
    }

    /// Wire up the real checker, LibSQL stores and alerting from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let catalog = config.catalog()?;

        info!("Opening database at {}", config.database.path);
        let store = Arc::new(open_store(&config.database.path, config.database.pool_size).await?);
        let persistence = Persistence::new(store.clone(), store);

        let checker = Arc::new(HttpChecker::new(Duration::from_secs(config.monitor.timeout_seconds))?);
        let mut runner = Runner::new(checker, config.monitor.max_concurrency);
        if let Some(deadline) = config.monitor.run_deadline_seconds {
            runner = runner.with_run_deadline(Duration::from_secs(deadline));
        }

        let alerts = if config.alert.enabled {
            let transport: Arc<dyn AlertTransport> = Arc::new(WebhookTransport::new(
                config.alert.webhook_url.clone(),
                config.alert.recipient.clone(),
                Duration::from_secs(config.alert.timeout_seconds),
            )?);
            let secrets: Arc<dyn SecretSource> = match config.alert.secret_source {
                SecretSourceKind::Env => Arc::new(EnvSecretSource),
                SecretSourceKind::File => Arc::new(FileSecretSource::new(
                    config.alert.secret_dir.clone().unwrap_or_default(),
                )),
            };
            Some(AlertDispatcher::new(transport, secrets, config.alert.secret_id.clone()))
        } else {
            if !catalog.is_empty() {
                warn!(
                    endpoints = catalog.len(),
                    "Alerting is disabled (alert.enabled = false) - transitions will only be logged"
                );
            }
            None
        };

        info!(endpoints = catalog.len(), "Orchestrator ready");
        Ok(Self::new(catalog, runner, persistence, alerts))
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    /// Execute one complete run
    ///
    /// Returns `Err` only when the prior snapshot could not be read, in which
    /// case nothing was probed or written. Persistence and alert failures are
    /// collected in `RunOutcome::errors` alongside the fresh snapshot.
    pub async fn run_once(&self) -> Result<RunOutcome, RunError> {
        let run_id = Uuid::new_v4();
        self.execute(run_id).instrument(info_span!("run", %run_id)).await
    }

    async fn execute(&self, run_id: Uuid) -> Result<RunOutcome, RunError> {
        let prior = self.persistence.load_prior(&self.catalog).await.map_err(|e| {
            error!("Aborting run: {}", e);
            RunError::from(e)
        })?;

        let report = self.runner.run(&self.catalog, &prior).await;
        let mut errors = Vec::new();

        for (name, transition) in report.transitions.iter() {
            if transition.recovered() {
                info!(endpoint = name, "Endpoint recovered");
            } else {
                warn!(endpoint = name, "Endpoint went down");
            }
        }

        if let Err(e) = self.persistence.commit(&report.fresh).await {
            errors.push(RunError::Persistence(e));
        }

        // Alerting does not depend on the commit having succeeded.
        let mut alert_sent = false;
        if !report.transitions.is_empty() {
            match &self.alerts {
                Some(dispatcher) => match dispatcher.notify(&report.transitions, &report.fresh).await {
                    Ok(()) => alert_sent = true,
                    Err(e) => {
                        error!("Alert delivery failed: {}", e);
                        errors.push(RunError::Alert(e));
                    }
                },
                None => info!(transitions = report.transitions.len(), "Alerting disabled, not sending"),
            }
        }

        info!(
            endpoints = report.fresh.len(),
            transitions = report.transitions.len(),
            errors = errors.len(),
            "Run finished"
        );

        Ok(RunOutcome {
            run_id,
            fresh: report.fresh,
            transitions: report.transitions,
            errors,
            alert_sent,
        })
    }

    /// Run on a fixed interval until ctrl-c
    ///
    /// Runs never overlap: a run that overruns the interval delays the next
    /// tick instead of stacking up behind it.
    pub async fn watch(&self, interval: Duration) -> Result<()> {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Watching {} endpoints every {}s", self.catalog.len(), interval.as_secs());

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match self.run_once().await {
                        Ok(outcome) => {
                            for e in &outcome.errors {
                                error!(run_id = %outcome.run_id, "Run error: {}", e);
                            }
                        }
                        Err(e) => error!("Run aborted: {}", e),
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping watch loop");
                    return Ok(());
                }
            }
        }
    }
}
