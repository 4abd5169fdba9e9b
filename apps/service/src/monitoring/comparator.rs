use std::collections::BTreeMap;

use super::types::{StatusMap, Transition, TransitionSet};

/// Endpoints present in both snapshots whose success state differs
///
/// Names seen for the first time, and names that dropped out of the
/// catalog, are never transitions.
pub fn diff(fresh: &StatusMap, prior: &StatusMap) -> TransitionSet {
    let entries: BTreeMap<String, Transition> = fresh
        .iter()
        .filter_map(|(name, current)| {
            let previous = prior.get(name)?;
            (previous.success != current.success).then(|| {
                (
                    name.clone(),
                    Transition { previous: previous.success, current: current.success },
                )
            })
        })
        .collect();

    TransitionSet::from_entries(entries)
}
