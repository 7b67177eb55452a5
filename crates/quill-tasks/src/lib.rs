//! # quill-tasks
//!
//! Task ordering, bucketing, and completion with `SQLite` persistence.
//!
//! [`TaskService`] is the entry point. Every operation runs in one
//! transaction that reads the user's rows fresh, feeds them through the
//! `quill-core` engine, and writes the result back.

#![deny(unsafe_code)]

pub mod database;
pub mod errors;
pub mod migrations;
pub mod reference;
pub mod reorder;
pub mod repository;
pub mod row_helpers;
pub mod service;
pub mod types;

pub use database::Database;
pub use errors::TaskError;
pub use service::{DEFAULT_COMPLETED_LIMIT, TaskService};
pub use types::{
    BucketedTasks, GenerationReport, Position, ReferenceTask, ReferenceTaskCreateParams,
    ReferenceTaskUpdateParams, ReorderReport, SubtaskCreateParams, Task, TaskCreateParams,
    TaskNode, ToggleOutcome,
};
