use std::fmt;

use thiserror::Error;

/// Rejected endpoint catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("endpoint with url {url} has an empty name")]
    EmptyName { url: String },
    #[error("endpoint name {0:?} is used more than once")]
    DuplicateName(String),
    #[error("endpoint {name:?} has an invalid url: {source:#}")]
    InvalidUrl { name: String, source: anyhow::Error },
}

/// Configuration could not be loaded or is not usable
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed { path: String, source: std::io::Error },
    #[error("failed to write config file {path}: {source}")]
    WriteFailed { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed { path: String, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available: set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid config: {0:#}")]
    Invalid(anyhow::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// The previous snapshot could not be loaded; nothing was probed or written
#[derive(Debug, Error)]
#[error("failed to load prior state for {name:?}: {source:#}")]
pub struct ReadPriorStateError {
    pub name: String,
    pub source: anyhow::Error,
}

/// One or both stores rejected the run's records
///
/// Each store is written independently, so either side may be set alone.
#[derive(Debug)]
pub struct PersistenceError {
    pub state: Option<anyhow::Error>,
    pub history: Option<anyhow::Error>,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.history) {
            (Some(state), Some(history)) => write!(
                f,
                "state store write failed: {state:#}; history store append failed: {history:#}"
            ),
            (Some(state), None) => write!(f, "state store write failed: {state:#}"),
            (None, Some(history)) => write!(f, "history store append failed: {history:#}"),
            (None, None) => write!(f, "persistence failed"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// The alert for this run was not delivered
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("failed to retrieve alert credential {id:?}: {source:#}")]
    Secret { id: String, source: anyhow::Error },
    #[error("alert transport failed: {0:#}")]
    Transport(anyhow::Error),
}

/// Run-level failure reported to the caller of `run_once`
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    ReadPriorState(#[from] ReadPriorStateError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Alert(#[from] AlertError),
}
