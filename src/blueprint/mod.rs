//! In-memory blueprint: the set of work items and the operations that
//! keep it consistent.
//!
//! Every mutation either applies completely or leaves the blueprint as it
//! was. The dependency graph is kept acyclic and free of dangling labels.

pub mod document;
mod item;
pub mod resolver;
mod splitter;
mod state;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

pub use item::{Attempts, Kind, Status, SubItemSpec, WorkItem};
pub use resolver::ItemMap;
pub use splitter::Splitter;
pub use state::{Advance, StatusMachine};

use crate::error::{BlueprintError, Result};

/// Count of items per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub todo: usize,
    pub partial: usize,
    pub done: usize,
    pub hard: usize,
    pub eligible: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blueprint {
    items: ItemMap,
    // Document order; items are never removed.
    order: Vec<String>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a blueprint from items in document order, statuses as given.
    ///
    /// Rejects dangling dependencies, cycles, attempts over budget and
    /// `done` items whose dependencies are not all `done`.
    pub fn from_items(items: Vec<WorkItem>) -> Result<Self> {
        let mut blueprint = Self::new();
        blueprint.commit(items)?;
        Ok(blueprint)
    }

    pub fn parse(doc: &str) -> Result<Self> {
        Self::from_items(document::parse(doc)?)
    }

    pub fn to_document(&self) -> String {
        document::serialize(self.list())
    }

    pub fn get(&self, label: &str) -> Result<&WorkItem> {
        self.items
            .get(label)
            .ok_or_else(|| BlueprintError::NotFound(label.to_string()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.items.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in document order.
    pub fn list(&self) -> impl Iterator<Item = &WorkItem> {
        self.order.iter().filter_map(|label| self.items.get(label))
    }

    pub fn items(&self) -> &ItemMap {
        &self.items
    }

    /// Inserts or replaces a single item.
    pub fn upsert(&mut self, item: WorkItem) -> Result<()> {
        self.upsert_batch(vec![item])
    }

    /// Inserts or replaces several items at once.
    ///
    /// New items must be `todo`. A replaced item keeps its stored status and
    /// attempts, which only change through [`advance`](Self::advance),
    /// [`revert`](Self::revert) and [`split`](Self::split). Fails with
    /// `NotFound` when a dependency names an unknown label and with
    /// `CycleDetected` when the result would contain a cycle. New labels
    /// are placed just before the first already-known label of the batch,
    /// or at the end.
    pub fn upsert_batch(&mut self, batch: Vec<WorkItem>) -> Result<()> {
        let mut prepared = Vec::with_capacity(batch.len());
        for mut item in batch {
            match self.items.get(&item.label) {
                Some(stored) => {
                    item.status = stored.status;
                    item.attempts = stored.attempts;
                }
                None if item.status != Status::Todo => {
                    return Err(BlueprintError::transition(
                        &item.label,
                        Status::Todo,
                        item.status,
                        "new items start as todo",
                    ));
                }
                None => {}
            }
            prepared.push(item);
        }
        self.commit(prepared)
    }

    // Stages `batch` over a copy of the items and swaps it in only when the
    // whole graph checks out.
    fn commit(&mut self, batch: Vec<WorkItem>) -> Result<()> {
        let mut staged = self.items.clone();
        let mut fresh: Vec<String> = Vec::new();
        let mut anchor: Option<usize> = None;

        for item in batch {
            validate_label(&item.label)?;
            let item = document::normalize_item(item);
            validate_fields(&item)?;
            if staged.contains_key(&item.label) {
                if anchor.is_none() {
                    anchor = self.order.iter().position(|l| *l == item.label);
                }
            } else {
                fresh.push(item.label.clone());
            }
            staged.insert(item.label.clone(), item);
        }

        for item in staged.values() {
            if let Some(missing) = item.dependencies.iter().find(|d| !staged.contains_key(*d)) {
                return Err(BlueprintError::NotFound(missing.clone()));
            }
        }
        resolver::check_acyclic(&staged)?;
        check_completion(&staged)?;

        let at = anchor.unwrap_or(self.order.len());
        self.order.splice(at..at, fresh);
        self.items = staged;
        Ok(())
    }

    pub fn advance(&mut self, label: &str, requested: Status, attempts_delta: u32) -> Result<Advance> {
        StatusMachine::advance(&mut self.items, label, requested, attempts_delta)
    }

    pub fn revert(&mut self, label: &str) -> Result<Advance> {
        StatusMachine::revert(&mut self.items, label)
    }

    /// Splits `target` into a chain of `steps`; returns the new labels in
    /// chain order.
    pub fn split(&mut self, target: &str, steps: &[SubItemSpec], new_budget: u32) -> Result<Vec<String>> {
        let batch = Splitter::plan(&self.items, target, steps, new_budget)?;
        let created: Vec<String> = batch
            .iter()
            .filter(|item| item.label != target)
            .map(|item| item.label.clone())
            .collect();
        self.commit(batch)?;
        info!(%target, steps = created.len(), "split item");
        Ok(created)
    }

    pub fn eligible(&self) -> Vec<&WorkItem> {
        resolver::eligible(&self.items)
    }

    pub fn topological_order(&self) -> Result<Vec<&WorkItem>> {
        resolver::topological_order(&self.items)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.items.len(),
            eligible: self.eligible().len(),
            ..Default::default()
        };
        for item in self.items.values() {
            match item.status {
                Status::Todo => summary.todo += 1,
                Status::Partial => summary.partial += 1,
                Status::Done => summary.done += 1,
                Status::Hard => summary.hard += 1,
            }
        }
        summary
    }

    /// Labels of items that depend on `label`, directly or transitively.
    pub fn downstream(&self, label: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack = vec![label.to_string()];
        while let Some(current) = stack.pop() {
            for dependent in resolver::dependents_of(&self.items, &current) {
                if found.insert(dependent.label.clone()) {
                    stack.push(dependent.label.clone());
                }
            }
        }
        found
    }
}

// Labels appear in `# <kind> <label>` headings and `[label]` lists.
fn validate_label(label: &str) -> Result<()> {
    let bad = label.is_empty()
        || label.contains(char::is_whitespace)
        || label.contains(['[', ']', ',']);
    if bad {
        return Err(BlueprintError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

// Free text may hold anything; these fields end up on single meta lines.
fn validate_fields(item: &WorkItem) -> Result<()> {
    let Attempts { current, budget } = item.attempts;
    if current > budget {
        return Err(BlueprintError::invalid_item(
            &item.label,
            format!("attempts {current} exceed budget {budget}"),
        ));
    }
    if item.location.as_deref().is_some_and(|l| l.contains(['\n', '\r'])) {
        return Err(BlueprintError::invalid_item(
            &item.label,
            "location must be a single line",
        ));
    }
    Ok(())
}

// A done item needs every dependency done.
fn check_completion(items: &ItemMap) -> Result<()> {
    for item in items.values().filter(|i| i.status == Status::Done) {
        let pending = item
            .dependencies
            .iter()
            .find(|dep| items.get(*dep).is_some_and(|d| d.status != Status::Done));
        if let Some(dep) = pending {
            return Err(BlueprintError::transition(
                &item.label,
                Status::Done,
                Status::Done,
                format!("dependency `{dep}` is not done"),
            ));
        }
    }
    Ok(())
}
