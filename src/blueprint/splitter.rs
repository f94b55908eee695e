use std::collections::BTreeSet;

use super::item::{Attempts, Kind, Status, SubItemSpec, WorkItem};
use super::resolver::{ItemMap, upstream_of};
use crate::error::{BlueprintError, Result};

/// Replaces one item with a chain of smaller steps that ends in it.
///
/// For a target `T` with dependencies `D` and steps `[S1, .., Sn]` the
/// planned batch is `S1 <- D`, `Sk <- S(k-1)`, `T <- Sn`. Every step starts
/// as `todo` with `(0, new_budget)` attempts; `T` goes back to `todo` with
/// its own budget and a fresh counter.
pub struct Splitter;

impl Splitter {
    /// Builds the batch to upsert. Does not touch `items`.
    pub fn plan(
        items: &ItemMap,
        target: &str,
        steps: &[SubItemSpec],
        new_budget: u32,
    ) -> Result<Vec<WorkItem>> {
        let original = items
            .get(target)
            .ok_or_else(|| BlueprintError::NotFound(target.to_string()))?;

        if steps.is_empty() {
            return Err(BlueprintError::EmptySplit(target.to_string()));
        }

        if original.status == Status::Done {
            return Err(BlueprintError::transition(
                target,
                Status::Done,
                Status::Todo,
                "done items are not split",
            ));
        }

        // Earlier steps of the chain sit anywhere upstream, not only right
        // before the target.
        let in_progress: Vec<String> = upstream_of(items, target)
            .into_iter()
            .filter(|dep| items.get(dep).is_some_and(|d| d.status == Status::Partial))
            .collect();
        if !in_progress.is_empty() {
            return Err(BlueprintError::transition(
                target,
                original.status,
                Status::Todo,
                format!("dependencies still in progress: {}", in_progress.join(", ")),
            ));
        }

        let labels = Self::assign_labels(items, target, original.status, steps)?;

        let mut batch = Vec::with_capacity(steps.len() + 1);
        let mut previous: BTreeSet<String> = original.dependencies.clone();
        for (label, step) in labels.iter().zip(steps) {
            let mut sub = WorkItem::new(label.clone(), step.kind.unwrap_or(Kind::Lemma), new_budget)
                .with_statement(&step.statement)
                .with_proof(&step.proof)
                .with_priority(original.priority);
            sub.dependencies = std::mem::take(&mut previous);
            previous = BTreeSet::from([label.clone()]);
            batch.push(sub);
        }

        let mut rewritten = original.clone();
        rewritten.dependencies = previous;
        rewritten.status = Status::Todo;
        rewritten.attempts = Attempts::new(original.attempts.budget);
        batch.push(rewritten);

        Ok(batch)
    }

    // Explicit labels must be fresh and distinct; missing ones become
    // `<target>_<n>` with the smallest unused n.
    fn assign_labels(
        items: &ItemMap,
        target: &str,
        status: Status,
        steps: &[SubItemSpec],
    ) -> Result<Vec<String>> {
        let mut taken: BTreeSet<String> = BTreeSet::new();
        for label in steps.iter().filter_map(|s| s.label.as_deref()) {
            let label = label.trim();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(BlueprintError::transition(
                    target,
                    status,
                    Status::Todo,
                    format!("invalid sub-item label `{label}`"),
                ));
            }
            if items.contains_key(label) || !taken.insert(label.to_string()) {
                return Err(BlueprintError::transition(
                    target,
                    status,
                    Status::Todo,
                    format!("sub-item label `{label}` is already used"),
                ));
            }
        }

        let mut counter = 0;
        let mut labels = Vec::with_capacity(steps.len());
        for step in steps {
            match step.label.as_deref() {
                Some(label) => labels.push(label.trim().to_string()),
                None => loop {
                    counter += 1;
                    let candidate = format!("{target}_{counter}");
                    if !items.contains_key(&candidate) && !taken.contains(&candidate) {
                        taken.insert(candidate.clone());
                        labels.push(candidate);
                        break;
                    }
                },
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ItemMap {
        let a = WorkItem::new("A", Kind::Lemma, 10);
        let c = WorkItem::new("C", Kind::Theorem, 50)
            .with_dependencies(["A"])
            .with_statement("C holds");
        [a, c].into_iter().map(|i| (i.label.clone(), i)).collect()
    }

    fn find<'a>(batch: &'a [WorkItem], label: &str) -> &'a WorkItem {
        batch.iter().find(|i| i.label == label).unwrap()
    }

    #[test]
    fn split_builds_chain_ending_in_target() {
        let steps = vec![
            SubItemSpec::labeled("C1", "first half", "by A"),
            SubItemSpec::labeled("C2", "second half", "by C1"),
        ];
        let batch = Splitter::plan(&base(), "C", &steps, 20).unwrap();
        assert_eq!(batch.len(), 3);

        let c1 = find(&batch, "C1");
        let c2 = find(&batch, "C2");
        let c = find(&batch, "C");
        assert_eq!(c1.dependencies, BTreeSet::from(["A".to_string()]));
        assert_eq!(c2.dependencies, BTreeSet::from(["C1".to_string()]));
        assert_eq!(c.dependencies, BTreeSet::from(["C2".to_string()]));
        for item in [c1, c2, c] {
            assert_eq!(item.status, Status::Todo);
        }
        assert_eq!(c1.attempts, Attempts::new(20));
        assert_eq!(c.attempts, Attempts::new(50));
        assert_eq!(c.informal_statement, "C holds");
    }

    #[test]
    fn empty_split_is_rejected() {
        let err = Splitter::plan(&base(), "C", &[], 20).unwrap_err();
        assert!(matches!(err, BlueprintError::EmptySplit(label) if label == "C"));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let err = Splitter::plan(&base(), "Z", &[SubItemSpec::new("s", "")], 1).unwrap_err();
        assert!(matches!(err, BlueprintError::NotFound(_)));
    }

    #[test]
    fn hard_target_is_reset() {
        let mut items = base();
        let c = items.get_mut("C").unwrap();
        c.status = Status::Hard;
        c.attempts.current = 50;

        let batch = Splitter::plan(&items, "C", &[SubItemSpec::new("step", "")], 5).unwrap();
        let c = find(&batch, "C");
        assert_eq!(c.status, Status::Todo);
        assert_eq!(c.attempts, Attempts { current: 0, budget: 50 });
    }

    #[test]
    fn generated_labels_skip_existing_ones() {
        let mut items = base();
        items.insert("C_1".into(), WorkItem::new("C_1", Kind::Lemma, 1));

        let steps = vec![SubItemSpec::new("x", ""), SubItemSpec::new("y", "")];
        let batch = Splitter::plan(&items, "C", &steps, 5).unwrap();
        let labels: Vec<&str> = batch.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["C_2", "C_3", "C"]);
    }

    #[test]
    fn duplicate_step_labels_are_rejected() {
        let steps = vec![
            SubItemSpec::labeled("S", "x", ""),
            SubItemSpec::labeled("S", "y", ""),
        ];
        let err = Splitter::plan(&base(), "C", &steps, 5).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidTransition { .. }));
    }

    #[test]
    fn step_label_colliding_with_item_is_rejected() {
        let steps = vec![SubItemSpec::labeled("A", "x", "")];
        let err = Splitter::plan(&base(), "C", &steps, 5).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidTransition { .. }));
    }

    #[test]
    fn done_target_is_rejected() {
        let mut items = base();
        items.get_mut("C").unwrap().status = Status::Done;
        let err = Splitter::plan(&items, "C", &[SubItemSpec::new("x", "")], 5).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidTransition { .. }));
    }

    #[test]
    fn resplit_with_partial_earlier_step_is_rejected() {
        let mut items = base();
        let steps = vec![
            SubItemSpec::labeled("C1", "first", ""),
            SubItemSpec::labeled("C2", "second", ""),
        ];
        for item in Splitter::plan(&items, "C", &steps, 5).unwrap() {
            items.insert(item.label.clone(), item);
        }
        items.get_mut("A").unwrap().status = Status::Done;
        items.get_mut("C1").unwrap().status = Status::Partial;

        let err = Splitter::plan(&items, "C", &[SubItemSpec::new("x", "")], 5).unwrap_err();
        match err {
            BlueprintError::InvalidTransition { reason, .. } => assert!(reason.contains("C1")),
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn resplit_with_partial_step_is_rejected() {
        let mut items = base();
        items.get_mut("A").unwrap().status = Status::Partial;
        let err = Splitter::plan(&items, "C", &[SubItemSpec::new("x", "")], 5).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidTransition { .. }));
    }
}
