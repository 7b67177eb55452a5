//! # quill-core
//!
//! Pure ordering engine for journal tasks. No I/O.
//!
//! - [`rank`]: lexicographically sortable rank keys and their allocator
//! - [`bucket`]: recurrence kind to bucket classification
//! - [`recurrence`]: schedules for recurring templates
//! - [`tree`]: per-request parent/child index
//! - [`gate`]: completion gate over the tree
//!
//! Storage lives in `quill-tasks`, which feeds rows into these types inside
//! a single transaction per request.

#![deny(unsafe_code)]

pub mod bucket;
pub mod errors;
pub mod gate;
pub mod ids;
pub mod rank;
pub mod recurrence;
pub mod tree;

pub use bucket::{Bucket, RecurrenceType};
pub use errors::{GateError, RankError, TreeError};
pub use gate::{CompletionState, Transition};
pub use ids::{JournalId, ReferenceTaskId, TaskId, UserId};
pub use rank::{DEFAULT_MAX_KEY_LENGTH, RankKey, Ranker};
pub use recurrence::RecurrenceRule;
pub use tree::{MAX_DEPTH, TaskTree, TreeLink};
