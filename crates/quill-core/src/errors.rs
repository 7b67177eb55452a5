//! Error types for the pure ordering engine.
//!
//! These never touch storage. `quill-tasks` converts them into its own
//! `TaskError` so callers only branch on one taxonomy.

use thiserror::Error;

use crate::ids::TaskId;

/// Errors from rank key parsing and allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    /// The string is not a valid key (empty, foreign symbol, or trailing pad digit).
    #[error("invalid rank key: {0:?}")]
    InvalidKey(String),

    /// The lower bound does not sort strictly before the upper bound.
    #[error("rank keys out of order: {low:?} must sort before {high:?}")]
    OutOfOrder {
        /// Requested lower bound.
        low: String,
        /// Requested upper bound.
        high: String,
    },

    /// The derived key would exceed the configured maximum length.
    #[error("rank key precision exhausted: {len} digits exceeds maximum of {max}")]
    PrecisionExhausted {
        /// Length the key would have needed.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Errors from the completion gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The task still has pending descendants.
    #[error("task {task_id} has {} incomplete sub-task(s)", blocking.len())]
    BlockedByIncompleteChildren {
        /// The task whose completion was requested.
        task_id: TaskId,
        /// Pending descendants, nearest first.
        blocking: Vec<TaskId>,
    },

    /// The task is not part of the tree the gate was given.
    #[error("task {0} is not in the task tree")]
    UnknownTask(TaskId),
}

/// Errors from hierarchy checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The new parent is the task itself or one of its descendants.
    #[error("task {task_id} cannot be placed under its own descendant {parent_id}")]
    Cycle {
        /// Task being moved.
        task_id: TaskId,
        /// Requested parent.
        parent_id: TaskId,
    },

    /// The move would nest some task deeper than allowed.
    #[error("moving task {task_id} would nest sub-tasks {depth} levels deep")]
    TooDeep {
        /// Task being moved.
        task_id: TaskId,
        /// Deepest level the subtree would reach.
        depth: usize,
    },

    /// A task is not part of the tree.
    #[error("task {0} is not in the task tree")]
    UnknownTask(TaskId),
}
