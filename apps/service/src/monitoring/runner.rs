use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::checker::Checker;
use super::comparator;
use super::types::{ProbeResult, StatusMap, TransitionSet};
use crate::catalog::{Endpoint, EndpointCatalog};

/// Fresh snapshot of one run plus the transitions it produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub fresh: StatusMap,
    pub transitions: TransitionSet,
}

/// Runner - fans probes out over the catalog and joins them into a snapshot
pub struct Runner {
    checker: Arc<dyn Checker>,
    max_concurrency: usize,
    run_deadline: Option<Duration>,
}

impl Runner {
    /// Create a new runner
    pub fn new(checker: Arc<dyn Checker>, max_concurrency: usize) -> Self {
        Self { checker, max_concurrency: max_concurrency.max(1), run_deadline: None }
    }

    /// Bound the whole run; probes still outstanding at expiry count as transport failures
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }

    /// Probe every catalog endpoint and diff the result against `prior`
    ///
    /// The returned snapshot always holds exactly one entry per catalog name,
    /// whatever happened to the individual probes.
    pub async fn run(&self, catalog: &EndpointCatalog, prior: &StatusMap) -> RunReport {
        let fresh = self.probe_all(catalog).await;
        let transitions = comparator::diff(&fresh, prior);
        RunReport { fresh, transitions }
    }

    async fn probe_all(&self, catalog: &EndpointCatalog) -> StatusMap {
        let started = SystemTime::now();
        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for endpoint in catalog.list() {
            let checker = self.checker.clone();
            let limiter = limiter.clone();
            let endpoint = endpoint.clone();

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let result = checker.check(&endpoint).await;
                (endpoint.name, result)
            });
        }

        let deadline = self.run_deadline.map(|limit| Instant::now() + limit);
        let mut fresh: StatusMap = HashMap::with_capacity(catalog.len());

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            outstanding = tasks.len(),
                            "Run deadline reached, cancelling outstanding probes"
                        );
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            match next {
                Some(Ok((name, result))) => {
                    debug!(endpoint = %name, success = result.success, "Probe finished");
                    fresh.insert(name, result);
                }
                Some(Err(e)) => warn!("Probe task failed: {}", e),
                None => break,
            }
        }

        // Anything without a result was cancelled or its task died.
        for endpoint in catalog.list() {
            if !fresh.contains_key(&endpoint.name) {
                fresh.insert(endpoint.name.clone(), unfinished(endpoint, started));
            }
        }

        let up = fresh.values().filter(|result| result.success).count();
        info!(endpoints = fresh.len(), up, down = fresh.len() - up, "Probes completed");

        fresh
    }
}

fn unfinished(endpoint: &Endpoint, started: SystemTime) -> ProbeResult {
    let elapsed = started.elapsed().unwrap_or_default();
    ProbeResult::transport_failure(
        endpoint,
        "probe did not complete: cancelled at the run deadline or its task failed",
        started,
        elapsed,
    )
}
