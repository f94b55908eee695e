use serde::{Deserialize, Serialize};
use tracing::info;

use super::item::{Attempts, Status};
use super::resolver::{ItemMap, dependencies_done, dependents_of};
use crate::error::{BlueprintError, Result};

/// The result of applying a status change to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advance {
    pub label: String,
    pub from: Status,
    pub requested: Status,
    /// What was actually stored; differs from `requested` when the
    /// attempt budget ran out.
    pub applied: Status,
    pub attempts: Attempts,
}

impl Advance {
    pub fn forced(&self) -> bool {
        self.applied != self.requested
    }
}

/// Enforces the item lifecycle:
///
/// - `todo → partial` once every dependency is done
/// - `partial → partial` to record attempts while work continues
/// - `partial → done | hard | todo`
/// - `done → todo` only through [`StatusMachine::revert`]
/// - `hard → todo` only through a split
pub struct StatusMachine;

impl StatusMachine {
    pub fn is_legal(from: Status, to: Status) -> bool {
        matches!(
            (from, to),
            (Status::Todo, Status::Partial)
                | (Status::Partial, Status::Partial)
                | (Status::Partial, Status::Done)
                | (Status::Partial, Status::Hard)
                | (Status::Partial, Status::Todo)
        )
    }

    /// Moves `label` to `requested`, adding `attempts_delta` attempts.
    ///
    /// If the budget is used up and `requested` is not `done`, the item
    /// lands in `hard` instead. Nothing is modified when this fails.
    pub fn advance(
        items: &mut ItemMap,
        label: &str,
        requested: Status,
        attempts_delta: u32,
    ) -> Result<Advance> {
        let item = items
            .get(label)
            .ok_or_else(|| BlueprintError::NotFound(label.to_string()))?;
        let from = item.status;

        if !Self::is_legal(from, requested) {
            let reason = match (from, requested) {
                (Status::Todo, Status::Done) => "item must be started first",
                (Status::Done, Status::Todo) => "done items are reopened with revert",
                (Status::Hard, Status::Todo) => "hard items are reopened by splitting",
                _ => "not allowed",
            };
            return Err(BlueprintError::transition(label, from, requested, reason));
        }

        if matches!(requested, Status::Partial | Status::Done) && !dependencies_done(items, item) {
            return Err(BlueprintError::transition(
                label,
                from,
                requested,
                "dependencies are not all done",
            ));
        }

        let mut attempts = item.attempts;
        attempts.record(attempts_delta);
        let applied = if attempts.exhausted() && requested != Status::Done {
            Status::Hard
        } else {
            requested
        };

        if let Some(item) = items.get_mut(label) {
            item.status = applied;
            item.attempts = attempts;
        }

        if applied != requested {
            info!(%label, %from, %requested, %attempts, "attempt budget exhausted, marking hard");
        } else {
            info!(%label, %from, to = %applied, %attempts, "status advanced");
        }

        Ok(Advance {
            label: label.to_string(),
            from,
            requested,
            applied,
            attempts,
        })
    }

    /// Reopens a `done` item. Refused while anything built on it has
    /// already been started.
    pub fn revert(items: &mut ItemMap, label: &str) -> Result<Advance> {
        let item = items
            .get(label)
            .ok_or_else(|| BlueprintError::NotFound(label.to_string()))?;
        if item.status != Status::Done {
            return Err(BlueprintError::transition(
                label,
                item.status,
                Status::Todo,
                "only done items can be reverted",
            ));
        }

        let started: Vec<&str> = dependents_of(items, label)
            .into_iter()
            .filter(|d| d.status != Status::Todo)
            .map(|d| d.label.as_str())
            .collect();
        if !started.is_empty() {
            return Err(BlueprintError::transition(
                label,
                Status::Done,
                Status::Todo,
                format!("dependents already started: {}", started.join(", ")),
            ));
        }

        let attempts = item.attempts;
        if let Some(item) = items.get_mut(label) {
            item.status = Status::Todo;
        }
        info!(%label, "reverted to todo");

        Ok(Advance {
            label: label.to_string(),
            from: Status::Done,
            requested: Status::Todo,
            applied: Status::Todo,
            attempts,
        })
    }
}
