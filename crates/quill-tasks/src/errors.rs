//! Error types for task storage and services.

use quill_core::{GateError, RankError, TaskId, TreeError};
use thiserror::Error;

/// Errors from task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Database operation failed. Nothing from the transaction is committed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entity missing, or not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g. "Task", "Reference task").
        entity: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// The entity exists but belongs to another user.
    #[error("{entity} {id} does not belong to the requesting user")]
    Forbidden {
        /// Entity type.
        entity: &'static str,
        /// The ID that failed the ownership check.
        id: String,
    },

    /// Cycle or depth-limit violation.
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Completion refused while descendants are pending.
    #[error("Cannot complete task {task_id}: {} sub-task(s) remain incomplete", blocking.len())]
    BlockedByIncompleteChildren {
        /// Task whose completion was requested.
        task_id: TaskId,
        /// Pending descendants.
        blocking: Vec<TaskId>,
    },

    /// Rank keys could not be allocated even after rebalancing the bucket.
    #[error("Rank precision exhausted: {0}")]
    PrecisionExhausted(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// Filesystem error while opening the database.
    #[error("IO error: {0}")]
    Io(String),
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.to_string(),
        }
    }

    /// Create a not-found error for a reference task.
    pub fn reference_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Reference task",
            id: id.to_string(),
        }
    }

    /// Create an ownership error for a task.
    pub fn task_forbidden(id: impl ToString) -> Self {
        Self::Forbidden {
            entity: "Task",
            id: id.to_string(),
        }
    }

    /// Create an ownership error for a reference task.
    pub fn reference_forbidden(id: impl ToString) -> Self {
        Self::Forbidden {
            entity: "Reference task",
            id: id.to_string(),
        }
    }
}

impl From<GateError> for TaskError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::BlockedByIncompleteChildren { task_id, blocking } => {
                Self::BlockedByIncompleteChildren { task_id, blocking }
            }
            GateError::UnknownTask(id) => Self::task_not_found(id),
        }
    }
}

impl From<TreeError> for TaskError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::UnknownTask(id) => Self::task_not_found(id),
            other => Self::InvalidHierarchy(other.to_string()),
        }
    }
}

impl From<RankError> for TaskError {
    fn from(err: RankError) -> Self {
        Self::PrecisionExhausted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = TaskError::task_not_found("task-123");
        assert_eq!(err.to_string(), "Task not found: task-123");
    }

    #[test]
    fn forbidden_display() {
        let err = TaskError::reference_forbidden("rtask-1");
        assert_eq!(
            err.to_string(),
            "Reference task rtask-1 does not belong to the requesting user"
        );
    }

    #[test]
    fn blocked_display() {
        let err = TaskError::BlockedByIncompleteChildren {
            task_id: TaskId::from("task-p"),
            blocking: vec![TaskId::from("task-c")],
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"Cannot complete task task-p: 1 sub-task(s) remain incomplete"
        );
    }

    #[test]
    fn tree_cycle_maps_to_invalid_hierarchy() {
        let err = TaskError::from(TreeError::Cycle {
            task_id: TaskId::from("a"),
            parent_id: TaskId::from("b"),
        });
        assert!(matches!(err, TaskError::InvalidHierarchy(_)));
    }

    #[test]
    fn database_from_rusqlite() {
        let sqlite_err =
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some("test".to_string()));
        assert!(TaskError::from(sqlite_err).to_string().contains("Database error"));
    }
}
