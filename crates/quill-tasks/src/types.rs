//! Domain types for tasks and recurring templates.
//!
//! Serialized with camelCase field names for the CLI's JSON output.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use quill_core::{
    Bucket, JournalId, RankKey, RecurrenceRule, RecurrenceType, ReferenceTaskId, TaskId, UserId,
};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

/// A task row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique ID.
    pub id: TaskId,
    /// Owner.
    pub user_id: UserId,
    /// Owning journal.
    pub journal_id: JournalId,
    /// Parent task, `None` for top-level tasks.
    pub parent_task_id: Option<TaskId>,
    /// Template this task was generated from, if any.
    pub reference_task_id: Option<ReferenceTaskId>,
    /// Title.
    pub title: String,
    /// Optional longer text.
    pub description: Option<String>,
    /// Recurrence kind; `None` for one-off tasks.
    pub recurrence_type: Option<RecurrenceType>,
    /// Recurrence interval copied from the template.
    pub recurrence_interval: Option<u32>,
    /// Date a generated instance is due.
    pub scheduled_date: Option<NaiveDate>,
    /// Completion flag.
    pub completed: bool,
    /// Set when `completed` became true; cleared on reopen.
    pub completed_at: Option<String>,
    /// Manual order key within the bucket.
    pub lexo_priority: RankKey,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}

impl Task {
    /// The bucket this task is listed and ordered in.
    pub fn bucket(&self) -> Bucket {
        Bucket::classify(self.recurrence_type)
    }

    /// Whether the task takes part in manual ordering.
    pub fn is_pending(&self) -> bool {
        !self.completed
    }
}

/// Parameters for creating a top-level task.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateParams {
    /// Owning journal.
    pub journal_id: JournalId,
    /// Title; trimmed, must not be empty.
    pub title: String,
    /// Optional description; blank means none.
    #[serde(default)]
    pub description: Option<String>,
}

/// Parameters for creating a sub-task.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskCreateParams {
    /// Title; trimmed, must not be empty.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Where a moved task lands relative to the reference task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Immediately before the reference task.
    Above,
    /// After the reference task (and its pending sub-tasks).
    Below,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Above => "above",
            Self::Below => "below",
        })
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            other => Err(format!("unknown position: {other}")),
        }
    }
}

/// What a reorder changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReport {
    /// The moved task followed by its carried sub-tasks, in their new order.
    pub moved: Vec<TaskId>,
    /// Number of rows whose key was rewritten (includes rebalanced siblings).
    pub keys_written: usize,
    /// Whether the bucket had to be rebalanced.
    pub rebalanced: bool,
}

/// Result of a completion toggle.
///
/// A blocked completion is not an error: `can_complete` is false, `error`
/// carries a user-facing message, and `task` is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    /// Completion state after the call.
    pub completed: bool,
    /// False when pending sub-tasks blocked the completion.
    pub can_complete: bool,
    /// Message for blocked completions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The task as stored after the call.
    pub task: Task,
}

// ─────────────────────────────────────────────────────────────────────────────
// Bucketed listing
// ─────────────────────────────────────────────────────────────────────────────

/// A pending task with its pending sub-tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    /// The task.
    pub task: Task,
    /// Bucket it is listed under.
    pub bucket: Bucket,
    /// Pending children in rank order.
    pub children: Vec<TaskNode>,
}

/// Pending tasks grouped by bucket, each list in rank order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketedTasks {
    /// Daily instances.
    pub daily: Vec<TaskNode>,
    /// Weekly instances.
    pub weekly: Vec<TaskNode>,
    /// Monthly instances.
    pub monthly: Vec<TaskNode>,
    /// Yearly instances.
    pub yearly: Vec<TaskNode>,
    /// Custom-interval instances.
    pub custom: Vec<TaskNode>,
    /// One-off tasks.
    pub regular: Vec<TaskNode>,
}

impl BucketedTasks {
    /// Root nodes of `bucket`.
    pub fn get(&self, bucket: Bucket) -> &[TaskNode] {
        match bucket {
            Bucket::Daily => &self.daily,
            Bucket::Weekly => &self.weekly,
            Bucket::Monthly => &self.monthly,
            Bucket::Yearly => &self.yearly,
            Bucket::Custom => &self.custom,
            Bucket::Regular => &self.regular,
        }
    }

    pub(crate) fn get_mut(&mut self, bucket: Bucket) -> &mut Vec<TaskNode> {
        match bucket {
            Bucket::Daily => &mut self.daily,
            Bucket::Weekly => &mut self.weekly,
            Bucket::Monthly => &mut self.monthly,
            Bucket::Yearly => &mut self.yearly,
            Bucket::Custom => &mut self.custom,
            Bucket::Regular => &mut self.regular,
        }
    }

    /// Depth-first display order of `bucket`.
    pub fn flatten_ids(&self, bucket: Bucket) -> Vec<TaskId> {
        fn walk(nodes: &[TaskNode], out: &mut Vec<TaskId>) {
            for node in nodes {
                out.push(node.task.id.clone());
                walk(&node.children, out);
            }
        }
        let mut out = Vec::new();
        walk(self.get(bucket), &mut out);
        out
    }

    /// Total number of tasks across all buckets, children included.
    pub fn len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.flatten_ids(*b).len()).sum()
    }

    /// Whether there are no pending tasks.
    pub fn is_empty(&self) -> bool {
        Bucket::ALL.iter().all(|b| self.get(*b).is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference tasks
// ─────────────────────────────────────────────────────────────────────────────

/// A recurring template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTask {
    /// Unique ID.
    pub id: ReferenceTaskId,
    /// Owner.
    pub user_id: UserId,
    /// Journal generated instances belong to.
    pub journal_id: JournalId,
    /// Title copied to instances.
    pub title: String,
    /// Description copied to instances.
    pub description: Option<String>,
    /// Schedule.
    pub rule: RecurrenceRule,
    /// First possible occurrence.
    pub starts_on: NaiveDate,
    /// Last possible occurrence.
    pub ends_on: Option<NaiveDate>,
    /// Inactive templates generate nothing.
    pub is_active: bool,
    /// Next date an instance is due, `None` when the schedule has ended.
    pub next_scheduled_date: Option<NaiveDate>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl ReferenceTask {
    /// Bucket of the instances this template generates.
    pub fn bucket(&self) -> Bucket {
        Bucket::classify(Some(self.rule.kind))
    }
}

/// Parameters for creating a recurring template.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTaskCreateParams {
    /// Journal for generated instances.
    pub journal_id: JournalId,
    /// Title; trimmed, must not be empty.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Schedule.
    pub rule: RecurrenceRule,
    /// First possible occurrence.
    pub starts_on: NaiveDate,
    /// Last possible occurrence.
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

/// Partial update of a recurring template. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTaskUpdateParams {
    /// New title.
    pub title: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New schedule.
    pub rule: Option<RecurrenceRule>,
    /// New start date.
    pub starts_on: Option<NaiveDate>,
    /// New end date; `Some(None)` removes the end.
    pub ends_on: Option<Option<NaiveDate>>,
    /// Pause or resume generation.
    pub is_active: Option<bool>,
}

/// Summary of one generation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    /// Date instances were generated for.
    pub date: Option<NaiveDate>,
    /// Instances inserted.
    pub tasks_created: usize,
    /// Due templates that already had an instance for the date.
    pub tasks_skipped: usize,
    /// Distinct owners of due templates.
    pub users_processed: usize,
    /// Due templates examined.
    pub reference_tasks_processed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parses() {
        assert_eq!("above".parse::<Position>(), Ok(Position::Above));
        assert_eq!("below".parse::<Position>(), Ok(Position::Below));
        assert!("beside".parse::<Position>().is_err());
    }

    #[test]
    fn empty_buckets() {
        let buckets = BucketedTasks::default();
        assert!(buckets.is_empty());
        assert_eq!(buckets.len(), 0);
        assert!(buckets.flatten_ids(Bucket::Regular).is_empty());
    }

    #[test]
    fn toggle_outcome_omits_missing_error() {
        let task = Task {
            id: TaskId::from("task-1"),
            user_id: UserId::from("u"),
            journal_id: JournalId::from("j"),
            parent_task_id: None,
            reference_task_id: None,
            title: "Write".into(),
            description: None,
            recurrence_type: None,
            recurrence_interval: None,
            scheduled_date: None,
            completed: true,
            completed_at: Some("2024-01-01T00:00:00.000Z".into()),
            lexo_priority: RankKey::initial(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        };
        let outcome = ToggleOutcome {
            completed: true,
            can_complete: true,
            error: None,
            task,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["canComplete"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["task"]["lexoPriority"], "i");
        assert_eq!(json["task"]["recurrenceType"], serde_json::Value::Null);
    }
}
