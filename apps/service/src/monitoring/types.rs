use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::catalog::Endpoint;

/// Status code recorded when no HTTP response was received at all
pub const TRANSPORT_FAILURE: i32 = -1;

/// Outcome of a single probe against one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Name of the endpoint that was probed
    pub name: String,

    /// URL that was requested
    pub url: String,

    /// HTTP status code, or `TRANSPORT_FAILURE` when nothing came back
    pub status_code: i32,

    /// When the request was issued
    pub tested_at: SystemTime,

    /// True only for an exact 200 response
    pub success: bool,

    /// Wall-clock time from request issue to completion, body drain included
    pub duration_nanos: u64,

    /// Failure description; empty when there is none
    pub error_message: String,
}

impl ProbeResult {
    /// A 200 response
    pub fn success(endpoint: &Endpoint, tested_at: SystemTime, duration: Duration) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            status_code: 200,
            tested_at,
            success: true,
            duration_nanos: duration_to_nanos(duration),
            error_message: String::new(),
        }
    }

    /// A response arrived, but not a 200
    pub fn unexpected_status(
        endpoint: &Endpoint,
        status_code: u16,
        reason: impl Into<String>,
        tested_at: SystemTime,
        duration: Duration,
    ) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            status_code: i32::from(status_code),
            tested_at,
            success: false,
            duration_nanos: duration_to_nanos(duration),
            error_message: reason.into(),
        }
    }

    /// No response was received
    pub fn transport_failure(
        endpoint: &Endpoint,
        error: impl Into<String>,
        tested_at: SystemTime,
        duration: Duration,
    ) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            status_code: TRANSPORT_FAILURE,
            tested_at,
            success: false,
            duration_nanos: duration_to_nanos(duration),
            error_message: error.into(),
        }
    }

    /// Copy of this result with `note` appended to the error message
    pub fn with_note(&self, note: &str) -> Self {
        let error_message = if self.error_message.is_empty() {
            note.to_string()
        } else {
            format!("{}; {}", self.error_message, note)
        };
        Self { error_message, ..self.clone() }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos)
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_nanos / 1_000_000
    }

    pub fn state_label(&self) -> &'static str {
        state_label(self.success)
    }

    /// Nanoseconds since the Unix epoch, used as the stored timestamp
    pub fn tested_at_nanos(&self) -> i64 {
        system_time_to_nanos(self.tested_at)
    }
}

pub fn state_label(success: bool) -> &'static str {
    if success { "up" } else { "down" }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Convert SystemTime to nanoseconds since the Unix epoch
pub fn system_time_to_nanos(time: SystemTime) -> i64 {
    let nanos = time.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

/// Convert nanoseconds since the Unix epoch back to SystemTime
pub fn nanos_to_system_time(nanos: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(u64::try_from(nanos).unwrap_or_default())
}

/// Most recent result per endpoint name
pub type StatusMap = HashMap<String, ProbeResult>;

/// One endpoint whose success state flipped between two runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: bool,
    pub current: bool,
}

impl Transition {
    pub fn recovered(&self) -> bool {
        !self.previous && self.current
    }
}

/// Endpoints whose success state changed, keyed and ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionSet {
    entries: BTreeMap<String, Transition>,
}

impl TransitionSet {
    pub(crate) fn from_entries(entries: BTreeMap<String, Transition>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Transition> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Transition)> {
        self.entries.iter().map(|(name, transition)| (name.as_str(), transition))
    }
}
