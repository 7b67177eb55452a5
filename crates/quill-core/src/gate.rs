//! Completion gate.
//!
//! Guards the `pending -> completed` edge: a task may only be completed once
//! every transitive descendant is completed. Reopening is always allowed,
//! including under a completed parent. Nothing cascades in either direction;
//! each level needs its own explicit toggle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GateError;
use crate::ids::TaskId;
use crate::tree::TaskTree;

/// Per-task completion state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionState {
    /// Not yet done.
    Pending,
    /// Done.
    Completed,
}

impl CompletionState {
    /// State for a stored `completed` flag.
    #[must_use]
    pub fn from_flag(completed: bool) -> Self {
        if completed { Self::Completed } else { Self::Pending }
    }

    /// The other state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

/// Field changes the gate allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Set `completed` and stamp `completed_at`.
    Complete {
        /// Completion timestamp.
        at: DateTime<Utc>,
    },
    /// Clear `completed` and `completed_at`.
    Reopen,
    /// Already in the requested state.
    Unchanged,
}

impl Transition {
    /// New `(completed, completed_at)` values, or `None` when nothing changes.
    #[must_use]
    pub fn fields(self) -> Option<(bool, Option<DateTime<Utc>>)> {
        match self {
            Self::Complete { at } => Some((true, Some(at))),
            Self::Reopen => Some((false, None)),
            Self::Unchanged => None,
        }
    }
}

/// Decide whether `id` may move to `target`.
///
/// The all-descendants-completed rule is checked only on the way to
/// `Completed`. Reopening a task under a completed ancestor succeeds and
/// leaves that ancestor completed, so the rule holds at completion time only.
pub fn evaluate(
    tree: &TaskTree,
    id: &TaskId,
    target: CompletionState,
    now: DateTime<Utc>,
) -> Result<Transition, GateError> {
    let current = tree
        .is_completed(id)
        .map(CompletionState::from_flag)
        .ok_or_else(|| GateError::UnknownTask(id.clone()))?;

    match (current, target) {
        (CompletionState::Pending, CompletionState::Pending)
        | (CompletionState::Completed, CompletionState::Completed) => Ok(Transition::Unchanged),
        (CompletionState::Completed, CompletionState::Pending) => Ok(Transition::Reopen),
        (CompletionState::Pending, CompletionState::Completed) => {
            let blocking = tree.incomplete_descendants(id);
            if blocking.is_empty() {
                Ok(Transition::Complete { at: now })
            } else {
                Err(GateError::BlockedByIncompleteChildren {
                    task_id: id.clone(),
                    blocking,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeLink;
    use assert_matches::assert_matches;

    fn tree(links: &[(&str, Option<&str>, bool)]) -> TaskTree {
        TaskTree::build(links.iter().map(|(id, parent, completed)| TreeLink {
            id: TaskId::from(*id),
            parent_id: parent.map(TaskId::from),
            completed: *completed,
        }))
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn leaf_completes() {
        let t = tree(&[("a", None, false)]);
        let out = evaluate(&t, &TaskId::from("a"), CompletionState::Completed, now()).unwrap();
        assert_eq!(out, Transition::Complete { at: now() });
        assert_eq!(out.fields(), Some((true, Some(now()))));
    }

    #[test]
    fn pending_child_blocks_parent() {
        let t = tree(&[("p", None, false), ("a", Some("p"), true), ("b", Some("p"), false)]);
        let err = evaluate(&t, &TaskId::from("p"), CompletionState::Completed, now()).unwrap_err();
        assert_matches!(
            err,
            GateError::BlockedByIncompleteChildren { blocking, .. } if blocking == vec![TaskId::from("b")]
        );
    }

    #[test]
    fn pending_grandchild_blocks_grandparent() {
        let t = tree(&[("p", None, false), ("a", Some("p"), true), ("a1", Some("a"), false)]);
        assert!(evaluate(&t, &TaskId::from("p"), CompletionState::Completed, now()).is_err());
    }

    #[test]
    fn reopen_always_allowed() {
        let t = tree(&[("p", None, true), ("a", Some("p"), true)]);
        let out = evaluate(&t, &TaskId::from("a"), CompletionState::Pending, now()).unwrap();
        assert_eq!(out, Transition::Reopen);
        assert_eq!(out.fields(), Some((false, None)));
    }

    #[test]
    fn completed_parent_is_not_rechecked_after_child_reopens() {
        let t = tree(&[("p", None, true), ("a", Some("p"), false)]);
        let out = evaluate(&t, &TaskId::from("p"), CompletionState::Completed, now()).unwrap();
        assert_eq!(out, Transition::Unchanged);
        let out = evaluate(&t, &TaskId::from("p"), CompletionState::Pending, now()).unwrap();
        assert_eq!(out, Transition::Reopen);
    }

    #[test]
    fn same_state_is_unchanged() {
        let t = tree(&[("a", None, true)]);
        let out = evaluate(&t, &TaskId::from("a"), CompletionState::Completed, now()).unwrap();
        assert_eq!(out, Transition::Unchanged);
        assert_eq!(out.fields(), None);
    }

    #[test]
    fn unknown_task() {
        let t = tree(&[]);
        assert_matches!(
            evaluate(&t, &TaskId::from("x"), CompletionState::Completed, now()),
            Err(GateError::UnknownTask(_))
        );
    }

    #[test]
    fn toggled_flips() {
        assert_eq!(CompletionState::from_flag(false).toggled(), CompletionState::Completed);
        assert_eq!(CompletionState::Completed.toggled(), CompletionState::Pending);
    }
}
