/// Monitoring engine module - probes endpoints and detects state changes
///
/// This module is responsible for:
/// - Executing HTTP checks against catalog endpoints
/// - Fanning probes out with bounded concurrency
/// - Diffing fresh results against the previous snapshot
/// - Validating targets and probe settings
pub mod checker;
pub mod comparator;
pub mod runner;
pub mod types;
pub mod validation;

pub use checker::HttpChecker;
pub use runner::Runner;
pub use types::{ProbeResult, StatusMap, TransitionSet};
