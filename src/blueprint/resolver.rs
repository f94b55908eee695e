//! Eligibility and ordering over the dependency graph.
//!
//! Both functions are deterministic: eligible items are ranked by
//! `(priority, label)` and topological ties break by label, so the same
//! blueprint always yields the same selection.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::item::{Status, WorkItem};
use crate::error::{BlueprintError, Result};

pub type ItemMap = BTreeMap<String, WorkItem>;

/// Whether every dependency of `item` exists and is `done`.
pub fn dependencies_done(items: &ItemMap, item: &WorkItem) -> bool {
    item.dependencies
        .iter()
        .all(|dep| items.get(dep).is_some_and(|d| d.status == Status::Done))
}

/// Items that may be started now, best candidate first.
pub fn eligible(items: &ItemMap) -> Vec<&WorkItem> {
    let mut ready: Vec<&WorkItem> = items
        .values()
        .filter(|item| item.status == Status::Todo && dependencies_done(items, item))
        .collect();
    ready.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.label.cmp(&b.label))
    });
    debug!(count = ready.len(), "computed eligible items");
    ready
}

/// Orders every item after all of its dependencies (Kahn's algorithm,
/// ties broken by label).
///
/// Fails with [`BlueprintError::CycleDetected`] when no such order exists.
/// Dependencies on labels outside `items` are ignored here.
pub fn topological_order(items: &ItemMap) -> Result<Vec<&WorkItem>> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for (label, item) in items {
        let known = item
            .dependencies
            .iter()
            .filter(|dep| items.contains_key(*dep));
        let mut count = 0;
        for dep in known {
            count += 1;
            dependents
                .entry(dep.as_str())
                .or_default()
                .insert(label.as_str());
        }
        in_degree.insert(label.as_str(), count);
    }

    let mut queue: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(label, _)| *label)
        .collect();

    let mut ordered = Vec::with_capacity(items.len());
    while let Some(label) = queue.pop_first() {
        ordered.push(&items[label]);
        let Some(next) = dependents.get(label) else {
            continue;
        };
        for dependent in next {
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    queue.insert(*dependent);
                }
            }
        }
    }

    if ordered.len() < items.len() {
        let placed: BTreeSet<&str> = ordered.iter().map(|i| i.label.as_str()).collect();
        let stuck: BTreeSet<&str> = items
            .keys()
            .map(String::as_str)
            .filter(|l| !placed.contains(l))
            .collect();
        return Err(BlueprintError::CycleDetected(cycle_members(items, stuck)));
    }

    Ok(ordered)
}

/// Fails with [`BlueprintError::CycleDetected`] when the graph has a cycle.
pub fn check_acyclic(items: &ItemMap) -> Result<()> {
    topological_order(items).map(|_| ())
}

/// Labels that directly depend on `label`.
pub fn dependents_of<'a>(items: &'a ItemMap, label: &str) -> Vec<&'a WorkItem> {
    items
        .values()
        .filter(|item| item.dependencies.contains(label))
        .collect()
}

/// Labels `label` depends on, directly or transitively.
pub fn upstream_of(items: &ItemMap, label: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut stack = vec![label];
    while let Some(current) = stack.pop() {
        let Some(item) = items.get(current) else {
            continue;
        };
        for dep in &item.dependencies {
            if found.insert(dep.clone()) {
                stack.push(dep.as_str());
            }
        }
    }
    found
}

// Kahn leaves behind cycle members plus everything downstream of them.
// Peel off nodes nothing in the leftover set depends on until only
// cycle members remain.
fn cycle_members<'a>(items: &'a ItemMap, mut stuck: BTreeSet<&'a str>) -> Vec<String> {
    loop {
        let needed: BTreeSet<&'a str> = stuck
            .iter()
            .flat_map(|label| items[*label].dependencies.iter().map(String::as_str))
            .filter(|dep| stuck.contains(dep))
            .collect();
        if needed.len() == stuck.len() {
            break;
        }
        stuck = needed;
    }
    stuck.into_iter().map(str::to_string).collect()
}
