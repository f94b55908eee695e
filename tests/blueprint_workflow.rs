//! End-to-end scenarios against a persisted blueprint document.

use std::collections::BTreeSet;

use blueprint::{
    Blueprint, BlueprintError, BlueprintStore, Kind, Status, StoreOptions, SubItemSpec, WorkItem,
};
use tempfile::TempDir;

fn store(tmp: &TempDir) -> BlueprintStore {
    BlueprintStore::open(tmp.path().join("BLUEPRINT.md"), StoreOptions::default()).unwrap()
}

fn labels(items: &[WorkItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}

#[test]
fn completing_a_dependency_unlocks_its_dependent() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.upsert(WorkItem::new("A", Kind::Lemma, 50)).unwrap();
    store
        .upsert(WorkItem::new("B", Kind::Lemma, 50).with_dependencies(["A"]))
        .unwrap();
    assert_eq!(labels(&store.eligible()), vec!["A"]);

    store.advance("A", Status::Partial, 0).unwrap();
    assert!(store.eligible().is_empty());
    store.advance("A", Status::Done, 0).unwrap();
    assert_eq!(labels(&store.eligible()), vec!["B"]);
}

#[test]
fn split_then_read_back_from_disk() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.upsert(WorkItem::new("A", Kind::Lemma, 50)).unwrap();
    store
        .upsert(
            WorkItem::new("C", Kind::Theorem, 50)
                .with_dependencies(["A"])
                .with_statement("C holds."),
        )
        .unwrap();

    store
        .split(
            "C",
            &[
                SubItemSpec::labeled("C1", "First reduction.", "From A."),
                SubItemSpec::labeled("C2", "Second reduction.", "From C1."),
            ],
            50,
        )
        .unwrap();

    let reopened = BlueprintStore::open(store.path(), StoreOptions::default()).unwrap();
    let deps = |label: &str| reopened.get(label).unwrap().dependencies;
    assert_eq!(deps("C1"), BTreeSet::from(["A".to_string()]));
    assert_eq!(deps("C2"), BTreeSet::from(["C1".to_string()]));
    assert_eq!(deps("C"), BTreeSet::from(["C2".to_string()]));
    for label in ["C1", "C2", "C"] {
        assert_eq!(reopened.get(label).unwrap().status, Status::Todo);
    }
    assert_eq!(labels(&reopened.list()), vec!["A", "C1", "C2", "C"]);
}

#[test]
fn exhausted_item_is_recovered_by_splitting() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.upsert(WorkItem::new("hard", Kind::Lemma, 2)).unwrap();

    store.claim_next().unwrap();
    let step = store.advance("hard", Status::Partial, 2).unwrap();
    assert_eq!(step.applied, Status::Hard);
    assert!(matches!(
        store.advance("hard", Status::Todo, 0),
        Err(BlueprintError::InvalidTransition { .. })
    ));

    let created = store
        .split("hard", &[SubItemSpec::new("Easier piece.", "")], 5)
        .unwrap();
    assert_eq!(created, vec!["hard_1"]);
    let item = store.get("hard").unwrap();
    assert_eq!(item.status, Status::Todo);
    assert_eq!(item.attempts.current, 0);
    assert_eq!(item.attempts.budget, 2);
    assert_eq!(labels(&store.eligible()), vec!["hard_1"]);
}

#[test]
fn topological_order_covers_the_whole_blueprint() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.upsert(WorkItem::new("def", Kind::Definition, 1)).unwrap();
    store
        .upsert(WorkItem::new("l2", Kind::Lemma, 1).with_dependencies(["def"]))
        .unwrap();
    store
        .upsert(WorkItem::new("l1", Kind::Lemma, 1).with_dependencies(["def"]))
        .unwrap();
    store
        .upsert(WorkItem::new("main", Kind::Theorem, 1).with_dependencies(["l1", "l2"]))
        .unwrap();

    let order = store.topological_order().unwrap();
    assert_eq!(labels(&order), vec!["def", "l1", "l2", "main"]);
}

#[test]
fn document_on_disk_is_stable_across_reloads() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store
        .upsert(WorkItem::new("d", Kind::Definition, 3).with_statement("A thing."))
        .unwrap();
    store
        .upsert(
            WorkItem::new("t", Kind::Theorem, 3)
                .with_dependencies(["d"])
                .with_statement("It works.")
                .with_proof("Obviously.")
                .with_priority(1),
        )
        .unwrap();

    let first = std::fs::read_to_string(store.path()).unwrap();
    let reparsed = Blueprint::parse(&first).unwrap();
    assert_eq!(reparsed.to_document(), first);
    assert!(first.contains("- uses: [[d]]\n"));
    assert!(first.contains("- file: (to be created)\n"));
}

#[test]
fn editing_a_finished_item_keeps_it_finished_across_reloads() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.upsert(WorkItem::new("A", Kind::Lemma, 5)).unwrap();
    store.advance("A", Status::Partial, 2).unwrap();
    store.advance("A", Status::Done, 0).unwrap();

    store
        .upsert(
            WorkItem::new("A", Kind::Lemma, 5)
                .with_statement("Restated.\n# theorem looks_like_a_heading"),
        )
        .unwrap();

    let reopened = BlueprintStore::open(store.path(), StoreOptions::default()).unwrap();
    let a = reopened.get("A").unwrap();
    assert_eq!(a.status, Status::Done);
    assert_eq!(a.attempts.current, 2);
    assert_eq!(a.informal_statement, "Restated.\n# theorem looks_like_a_heading");
    assert_eq!(reopened.list().len(), 1);
}
