//! Persisted, serialized access to a [`Blueprint`].
//!
//! [`BlueprintStore`] owns the in-memory blueprint behind a mutex and the
//! document it was loaded from. Each mutating call is one critical section:
//! the change is staged on a copy, written to disk, and only then made
//! visible. Readers never observe a half-applied change, and a failed write
//! leaves memory untouched.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::audit::{AuditLog, AuditRecord, Operation};
use crate::blueprint::{Advance, Blueprint, Status, SubItemSpec, WorkItem};
use crate::config::BlueprintConfig;
use crate::error::Result;
use crate::git::GitManager;

/// Side effects performed after each committed mutation.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub audit_log: Option<PathBuf>,
    pub git_commit: bool,
}

#[derive(Debug)]
pub struct BlueprintStore {
    path: PathBuf,
    state: Mutex<Blueprint>,
    audit: Option<AuditLog>,
    git_commit: bool,
}

impl BlueprintStore {
    /// Loads the document at `path`. A missing file is an empty blueprint;
    /// it is written on the first mutation.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        let blueprint = if path.exists() {
            let doc = std::fs::read_to_string(&path)?;
            Blueprint::parse(&doc)?
        } else {
            debug!(path = %path.display(), "blueprint file missing, starting empty");
            Blueprint::new()
        };
        info!(path = %path.display(), items = blueprint.len(), "blueprint loaded");

        Ok(Self {
            path,
            state: Mutex::new(blueprint),
            audit: options.audit_log.map(AuditLog::new),
            git_commit: options.git_commit,
        })
    }

    pub fn from_config(config: &BlueprintConfig) -> Result<Self> {
        Self::open(
            config.blueprint_path.clone(),
            StoreOptions {
                audit_log: config.audit_log.clone(),
                git_commit: config.git_commit,
            },
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audit_log(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Writes the current (possibly empty) document if the file does not
    /// exist yet. Returns whether a file was created.
    pub fn init(&self) -> Result<bool> {
        let guard = self.lock();
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&guard)?;
        Ok(true)
    }

    /// A consistent copy of the whole blueprint.
    pub fn snapshot(&self) -> Blueprint {
        self.lock().clone()
    }

    pub fn get(&self, label: &str) -> Result<WorkItem> {
        self.lock().get(label).cloned()
    }

    /// All items, in document order.
    pub fn list(&self) -> Vec<WorkItem> {
        self.lock().list().cloned().collect()
    }

    pub fn eligible(&self) -> Vec<WorkItem> {
        self.lock().eligible().into_iter().cloned().collect()
    }

    pub fn topological_order(&self) -> Result<Vec<WorkItem>> {
        let guard = self.lock();
        let order = guard.topological_order()?;
        Ok(order.into_iter().cloned().collect())
    }

    pub fn upsert(&self, item: WorkItem) -> Result<()> {
        self.mutate(|bp| {
            let label = item.label.clone();
            bp.upsert(item)?;
            Ok(((), AuditRecord::new(Operation::Upsert, vec![label])))
        })
    }

    pub fn advance(&self, label: &str, requested: Status, attempts_delta: u32) -> Result<Advance> {
        self.mutate(|bp| {
            let step = bp.advance(label, requested, attempts_delta)?;
            let record = AuditRecord::from_advance(Operation::Advance, &step);
            Ok((step, record))
        })
    }

    pub fn revert(&self, label: &str) -> Result<Advance> {
        self.mutate(|bp| {
            let step = bp.revert(label)?;
            let record = AuditRecord::from_advance(Operation::Revert, &step);
            Ok((step, record))
        })
    }

    /// Splits `target` and returns the created labels in chain order.
    pub fn split(&self, target: &str, steps: &[SubItemSpec], new_budget: u32) -> Result<Vec<String>> {
        self.mutate(|bp| {
            let created = bp.split(target, steps, new_budget)?;
            let mut labels = vec![target.to_string()];
            labels.extend(created.iter().cloned());
            Ok((created, AuditRecord::new(Operation::Split, labels)))
        })
    }

    /// Picks the best eligible item and marks it `partial` in the same
    /// critical section, so concurrent callers never start the same item.
    pub fn claim_next(&self) -> Result<Option<Advance>> {
        let mut guard = self.lock();
        let Some(label) = guard.eligible().first().map(|item| item.label.clone()) else {
            debug!("no eligible item to claim");
            return Ok(None);
        };

        let mut staged = guard.clone();
        let step = staged.advance(&label, Status::Partial, 0)?;
        self.save(&staged)?;
        *guard = staged;
        self.after_commit(&AuditRecord::from_advance(Operation::Claim, &step));
        Ok(Some(step))
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Blueprint) -> Result<(T, AuditRecord)>) -> Result<T> {
        let mut guard = self.lock();
        let mut staged = guard.clone();
        let (out, record) = apply(&mut staged)?;
        self.save(&staged)?;
        *guard = staged;
        self.after_commit(&record);
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Blueprint> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Write to a sibling temp file, then rename over the document.
    fn save(&self, blueprint: &Blueprint) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(blueprint.to_document().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), "blueprint saved");
        Ok(())
    }

    // The document is already on disk; failures here are reported, not
    // rolled back.
    fn after_commit(&self, record: &AuditRecord) {
        info!(operation = %record.operation, labels = ?record.labels, "mutation committed");

        if let Some(audit) = &self.audit
            && let Err(e) = audit.append(record)
        {
            warn!(path = %audit.path().display(), error = %e, "failed to append audit record");
        }

        if self.git_commit {
            let message = format!("blueprint: {}", record.summary());
            match self.commit(&message) {
                Ok(hash) => info!(%hash, %message, "committed blueprint"),
                Err(e) => warn!(error = %e, "git commit failed"),
            }
        }
    }

    fn commit(&self, message: &str) -> Result<String> {
        let git = GitManager::discover(&self.path)?;
        let mut files: Vec<&Path> = vec![self.path.as_path()];
        if let Some(audit) = &self.audit
            && audit.path().exists()
        {
            files.push(audit.path());
        }
        git.commit_files(&files, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::Kind;
    use crate::error::BlueprintError;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> BlueprintStore {
        BlueprintStore::open(tmp.path().join("BLUEPRINT.md"), StoreOptions::default()).unwrap()
    }

    fn lemma(label: &str, deps: &[&str]) -> WorkItem {
        WorkItem::new(label, Kind::Lemma, 50).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn missing_file_opens_empty_and_init_creates_it() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        assert!(store.list().is_empty());
        assert!(!store.path().exists());

        assert!(store.init().unwrap());
        assert!(store.path().exists());
        assert!(!store.init().unwrap());
    }

    #[test]
    fn mutations_are_persisted() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.upsert(lemma("A", &[])).unwrap();
        store.upsert(lemma("B", &["A"])).unwrap();
        store.advance("A", Status::Partial, 1).unwrap();

        let reopened = open(&tmp);
        assert_eq!(reopened.snapshot(), store.snapshot());
        assert_eq!(reopened.get("A").unwrap().status, Status::Partial);
    }

    #[test]
    fn rejected_mutation_leaves_disk_and_memory_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.upsert(lemma("A", &[])).unwrap();
        let doc = std::fs::read_to_string(store.path()).unwrap();

        let err = store.upsert(lemma("A", &["A"])).unwrap_err();
        assert!(matches!(err, BlueprintError::CycleDetected(_)));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), doc);
        assert!(store.get("A").unwrap().dependencies.is_empty());
    }

    #[test]
    fn claim_next_starts_best_item_once() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.upsert(lemma("b", &[])).unwrap();
        store.upsert(lemma("a", &[])).unwrap();

        let first = store.claim_next().unwrap().unwrap();
        assert_eq!(first.label, "a");
        assert_eq!(first.applied, Status::Partial);
        let second = store.claim_next().unwrap().unwrap();
        assert_eq!(second.label, "b");
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn concurrent_claims_never_share_an_item() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        for i in 0..8 {
            store.upsert(lemma(&format!("l{i}"), &[])).unwrap();
        }
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.claim_next().unwrap().map(|s| s.label))
            })
            .collect();
        let mut claimed: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 8);
        assert!(store.eligible().is_empty());
    }

    #[test]
    fn split_is_persisted_atomically() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.upsert(lemma("A", &[])).unwrap();
        store.upsert(lemma("C", &["A"])).unwrap();

        let created = store
            .split("C", &[SubItemSpec::new("one", ""), SubItemSpec::new("two", "")], 10)
            .unwrap();
        assert_eq!(created, vec!["C_1", "C_2"]);

        let reopened = open(&tmp);
        let c = reopened.get("C").unwrap();
        assert_eq!(c.dependencies.iter().collect::<Vec<_>>(), vec!["C_2"]);
        assert_eq!(reopened.get("C_1").unwrap().attempts.budget, 10);
    }

    #[test]
    fn audit_log_records_each_mutation() {
        let tmp = TempDir::new().unwrap();
        let audit_path = tmp.path().join("audit.jsonl");
        let store = BlueprintStore::open(
            tmp.path().join("BLUEPRINT.md"),
            StoreOptions {
                audit_log: Some(audit_path.clone()),
                git_commit: false,
            },
        )
        .unwrap();
        store.upsert(lemma("A", &[])).unwrap();
        store.claim_next().unwrap();
        let _ = store.advance("A", Status::Todo, 100);

        let records = AuditLog::new(audit_path).read_all().unwrap();
        let ops: Vec<Operation> = records.iter().map(|r| r.operation).collect();
        assert_eq!(ops, vec![Operation::Upsert, Operation::Claim, Operation::Advance]);
        assert_eq!(records[2].to, Some(Status::Hard));
    }

    #[test]
    fn git_commit_after_mutation() {
        let tmp = TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        let store = BlueprintStore::open(
            tmp.path().join("BLUEPRINT.md"),
            StoreOptions {
                audit_log: None,
                git_commit: true,
            },
        )
        .unwrap();
        store.upsert(lemma("A", &[])).unwrap();

        let git = GitManager::discover(store.path()).unwrap();
        assert_eq!(git.head_message().unwrap(), "blueprint: upsert A");
    }

    #[test]
    fn corrupt_document_fails_to_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("BLUEPRINT.md");
        std::fs::write(&path, "# lemma x\n## meta\n- label: x\n").unwrap();
        let err = BlueprintStore::open(path, StoreOptions::default()).unwrap_err();
        assert!(matches!(err, BlueprintError::Parse { .. }));
    }

    #[test]
    fn over_budget_item_never_reaches_disk() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store.upsert(lemma("A", &[])).unwrap();

        let mut x = WorkItem::new("x", Kind::Lemma, 3);
        x.attempts.current = 7;
        let err = store.upsert(x).unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidItem { .. }));

        let reopened = open(&tmp);
        assert!(!reopened.snapshot().contains("x"));
    }
}
