//! Reads the previous snapshot and commits each run's results.
//!
//! The state store and the history store are independent: a commit
//! always attempts both, and reports whichever failed. Nothing is rolled
//! back, so a partial commit is possible and is reconciled by later runs.

use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::catalog::EndpointCatalog;
use crate::database::{HistoryStore, StateStore};
use crate::error::{PersistenceError, ReadPriorStateError};
use crate::monitoring::types::{ProbeResult, StatusMap};

pub struct Persistence {
    state: Arc<dyn StateStore>,
    history: Arc<dyn HistoryStore>,
}

impl Persistence {
    pub fn new(state: Arc<dyn StateStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { state, history }
    }

    /// Last committed result for every catalog endpoint that has one
    ///
    /// Never-tested endpoints are simply absent; an empty store yields an
    /// empty map rather than an error.
    pub async fn load_prior(
        &self,
        catalog: &EndpointCatalog,
    ) -> Result<StatusMap, ReadPriorStateError> {
        let mut prior = StatusMap::with_capacity(catalog.len());

        for name in catalog.names() {
            let stored = self
                .state
                .get(name)
                .await
                .map_err(|source| ReadPriorStateError { name: name.to_string(), source })?;

            if let Some(result) = stored {
                prior.insert(name.to_string(), result);
            }
        }

        debug!(known = prior.len(), endpoints = catalog.len(), "Loaded prior state");
        Ok(prior)
    }

    /// Write `fresh` to the state store and append it to the history store
    pub async fn commit(&self, fresh: &StatusMap) -> Result<(), PersistenceError> {
        let state = self.write_state(fresh).await.err();
        if let Some(e) = &state {
            error!("State store write failed: {:#}", e);
        }

        let history = self.append_history(fresh).await.err();
        if let Some(e) = &history {
            error!("History store append failed: {:#}", e);
        }

        if state.is_none() && history.is_none() {
            info!(records = fresh.len(), "Committed run results");
            Ok(())
        } else {
            Err(PersistenceError { state, history })
        }
    }

    /// Every entry is attempted; failures are collected per endpoint
    async fn write_state(&self, fresh: &StatusMap) -> anyhow::Result<()> {
        let mut failed = Vec::new();
        for (name, result) in sorted(fresh) {
            if let Err(e) = self.state.put(name, result).await {
                warn!(endpoint = %name, "State write failed: {:#}", e);
                failed.push((name.as_str(), e));
            }
        }
        collect_failures("writing state", failed)
    }

    /// Every entry is attempted; failures are collected per endpoint
    async fn append_history(&self, fresh: &StatusMap) -> anyhow::Result<()> {
        let mut failed = Vec::new();
        for (name, result) in sorted(fresh) {
            if let Err(e) = self.history.append(result).await {
                warn!(endpoint = %name, "History append failed: {:#}", e);
                failed.push((name.as_str(), e));
            }
        }
        collect_failures("appending history", failed)
    }
}

fn collect_failures(action: &str, failed: Vec<(&str, anyhow::Error)>) -> anyhow::Result<()> {
    match failed.as_slice() {
        [] => Ok(()),
        [(name, e)] => Err(anyhow!("{action} for {name:?}: {e:#}")),
        [(_, first), ..] => {
            let names: Vec<_> = failed.iter().map(|(name, _)| format!("{name:?}")).collect();
            Err(anyhow!("{action} failed for {}: {first:#}", names.join(", ")))
        }
    }
}

/// Entries in name order
fn sorted(map: &StatusMap) -> Vec<(&String, &ProbeResult)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}
