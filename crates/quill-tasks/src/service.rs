//! Business logic layer for task management.
//!
//! Wraps the repository with validation, ordering, and the completion gate.
//! Key business rules:
//!
//! - **Bucket-scoped order**: pending tasks of one bucket share a single rank
//!   order; completed tasks drop out of it.
//! - **Depth limit**: sub-tasks nest at most [`MAX_DEPTH`] levels below top level.
//! - **Completion gate**: a task completes only when its whole subtree has.
//!   Nothing cascades.
//! - **Ownership**: every mutation checks the caller owns each touched row;
//!   a mismatch aborts the whole transaction.
//!
//! Reorder lives in [`crate::reorder`], recurring templates in
//! [`crate::reference`].

use std::collections::{HashMap, HashSet};

use quill_core::{
    CompletionState, MAX_DEPTH, Ranker, TaskId, TaskTree, TreeLink, UserId, gate,
};
use rusqlite::Connection;
use tracing::{debug, info, instrument};

use crate::database::Database;
use crate::errors::TaskError;
use crate::reorder::{after_subtree, bucket_run, place_block, write_placement};
use crate::repository::{TaskRepository, format_timestamp, now_iso};
use crate::types::{
    BucketedTasks, SubtaskCreateParams, Task, TaskCreateParams, TaskNode, ToggleOutcome,
};

/// Default page size for the completed-task list.
pub const DEFAULT_COMPLETED_LIMIT: usize = 50;

/// Task service. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct TaskService {
    pub(crate) db: Database,
    pub(crate) ranker: Ranker,
}

impl TaskService {
    /// Create a service over `db` allocating keys with `ranker`.
    pub fn new(db: Database, ranker: Ranker) -> Self {
        Self { db, ranker }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ─────────────────────────────────────────────────────────────────────
    // Create / read / delete
    // ─────────────────────────────────────────────────────────────────────

    /// Create a top-level one-off task at the top of the `regular` bucket.
    #[instrument(skip(self, params), fields(user = %user_id))]
    pub fn create_task(&self, user_id: &UserId, params: &TaskCreateParams) -> Result<Task, TaskError> {
        let title = clean_title(&params.title)?;
        let description = clean_text(params.description.as_deref());
        let ranker = self.ranker;

        self.db.with_tx(|tx| {
            let now = now_iso();
            let mut task = Task {
                id: TaskId::new(),
                user_id: user_id.clone(),
                journal_id: params.journal_id.clone(),
                parent_task_id: None,
                reference_task_id: None,
                title,
                description,
                recurrence_type: None,
                recurrence_interval: None,
                scheduled_date: None,
                completed: false,
                completed_at: None,
                lexo_priority: quill_core::RankKey::initial(),
                created_at: now.clone(),
                updated_at: now,
            };

            let tasks = TaskRepository::list_for_user(tx, user_id)?;
            let run = bucket_run(&tasks, task.bucket());
            insert_placed(tx, &ranker, &mut task, &run, 0)?;

            info!(task = %task.id, key = %task.lexo_priority, "task created");
            Ok(task)
        })
    }

    /// Create a sub-task directly after the parent's pending subtree.
    ///
    /// The sub-task inherits the parent's journal and recurrence fields, so it
    /// always lands in the parent's bucket.
    #[instrument(skip(self, params), fields(user = %user_id, parent = %parent_id))]
    pub fn create_subtask(
        &self,
        parent_id: &TaskId,
        user_id: &UserId,
        params: &SubtaskCreateParams,
    ) -> Result<Task, TaskError> {
        let title = clean_title(&params.title)?;
        let description = clean_text(params.description.as_deref());
        let ranker = self.ranker;

        self.db.with_tx(|tx| {
            let parent = load_owned(tx, parent_id, user_id)?;
            if parent.completed {
                return Err(TaskError::Validation(
                    "cannot add a sub-task to a completed task".into(),
                ));
            }

            let tasks = TaskRepository::list_for_user(tx, user_id)?;
            let tree = tree_of(&tasks);
            let depth = tree.depth_of(&parent.id) + 1;
            if depth > MAX_DEPTH {
                return Err(TaskError::InvalidHierarchy(format!(
                    "sub-tasks nest at most {MAX_DEPTH} levels deep"
                )));
            }

            let now = now_iso();
            let mut task = Task {
                id: TaskId::new(),
                user_id: user_id.clone(),
                journal_id: parent.journal_id.clone(),
                parent_task_id: Some(parent.id.clone()),
                reference_task_id: None,
                title,
                description,
                recurrence_type: parent.recurrence_type,
                recurrence_interval: parent.recurrence_interval,
                scheduled_date: parent.scheduled_date,
                completed: false,
                completed_at: None,
                lexo_priority: quill_core::RankKey::initial(),
                created_at: now.clone(),
                updated_at: now,
            };

            let run = bucket_run(&tasks, parent.bucket());
            let at = after_subtree(&tree, &run, &parent.id).unwrap_or(run.len());
            insert_placed(tx, &ranker, &mut task, &run, at)?;

            info!(task = %task.id, depth, key = %task.lexo_priority, "sub-task created");
            Ok(task)
        })
    }

    /// Get a task. Tasks of other users are reported as missing.
    pub fn get_task(&self, task_id: &TaskId, user_id: &UserId) -> Result<Task, TaskError> {
        self.db.with_conn(|conn| {
            TaskRepository::get_task(conn, task_id)?
                .filter(|t| t.user_id == *user_id)
                .ok_or_else(|| TaskError::task_not_found(task_id))
        })
    }

    /// Delete a task and its sub-tasks. Returns `false` when nothing matched.
    #[instrument(skip(self), fields(task = %task_id, user = %user_id))]
    pub fn delete_task(&self, task_id: &TaskId, user_id: &UserId) -> Result<bool, TaskError> {
        self.db.with_tx(|tx| {
            let deleted = TaskRepository::delete_task(tx, user_id, task_id)? > 0;
            if deleted {
                info!("task deleted");
            }
            Ok(deleted)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────

    /// Hang `task_id` under `new_parent`, or detach it to top level.
    ///
    /// A pending task is re-ranked, with its pending sub-tasks, directly after
    /// the new parent's subtree. Detaching keeps the current keys.
    #[instrument(skip(self), fields(task = %task_id, user = %user_id))]
    pub fn reparent(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        new_parent: Option<&TaskId>,
    ) -> Result<Task, TaskError> {
        let ranker = self.ranker;
        self.db.with_tx(|tx| {
            let task = load_owned(tx, task_id, user_id)?;
            let now = now_iso();

            let Some(parent_id) = new_parent else {
                if TaskRepository::set_parent(tx, user_id, task_id, None, &now)? != 1 {
                    return Err(TaskError::task_forbidden(task_id));
                }
                info!("task detached to top level");
                return load_owned(tx, task_id, user_id);
            };

            let parent = load_owned(tx, parent_id, user_id)?;
            let tasks = TaskRepository::list_for_user(tx, user_id)?;
            let tree = tree_of(&tasks);
            tree.check_attach(task_id, parent_id)?;

            if parent.bucket() != task.bucket() {
                return Err(TaskError::Validation(format!(
                    "cannot move a {} task under a {} task",
                    task.bucket(),
                    parent.bucket()
                )));
            }
            let subtree_pending = task.is_pending() || !tree.incomplete_descendants(task_id).is_empty();
            if parent.completed && subtree_pending {
                return Err(TaskError::Validation(
                    "cannot move pending tasks under a completed task".into(),
                ));
            }

            if TaskRepository::set_parent(tx, user_id, task_id, Some(parent_id), &now)? != 1 {
                return Err(TaskError::task_forbidden(task_id));
            }

            if task.is_pending() {
                let mut block = vec![task.id.clone()];
                block.extend(tree.incomplete_descendants(task_id));
                let blocked: HashSet<&TaskId> = block.iter().collect();
                let remaining: Vec<_> = bucket_run(&tasks, task.bucket())
                    .into_iter()
                    .filter(|(id, _)| !blocked.contains(id))
                    .collect();
                let at = after_subtree(&tree, &remaining, parent_id).unwrap_or(remaining.len());
                let ordered = order_block(&tasks, &block);
                let placement = place_block(&ranker, &remaining, at, &ordered)?;
                let written = write_placement(tx, user_id, &placement, None)?;
                debug!(written, rebalanced = placement.rebalanced, "subtree re-ranked");
            }

            info!(parent = %parent_id, "task reparented");
            load_owned(tx, task_id, user_id)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Completion
    // ─────────────────────────────────────────────────────────────────────

    /// Flip a task's completion state.
    ///
    /// A completion blocked by pending sub-tasks is reported in the outcome
    /// (`can_complete = false`) and changes nothing.
    #[instrument(skip(self), fields(task = %task_id, user = %user_id))]
    pub fn toggle_completion(&self, task_id: &TaskId, user_id: &UserId) -> Result<ToggleOutcome, TaskError> {
        self.db.with_tx(|tx| {
            let task = load_owned(tx, task_id, user_id)?;
            let target = CompletionState::from_flag(task.completed).toggled();
            match apply_completion(tx, &task, user_id, target) {
                Ok(updated) => Ok(ToggleOutcome {
                    completed: updated.completed,
                    can_complete: true,
                    error: None,
                    task: updated,
                }),
                Err(TaskError::BlockedByIncompleteChildren { blocking, .. }) => {
                    info!(blocking = blocking.len(), "completion blocked by sub-tasks");
                    Ok(ToggleOutcome {
                        completed: task.completed,
                        can_complete: false,
                        error: Some(format!(
                            "Cannot complete task: {} sub-task(s) remain incomplete",
                            blocking.len()
                        )),
                        task,
                    })
                }
                Err(other) => Err(other),
            }
        })
    }

    /// Set a task's completion state, failing with
    /// [`TaskError::BlockedByIncompleteChildren`] when the gate refuses.
    #[instrument(skip(self), fields(task = %task_id, user = %user_id))]
    pub fn set_completion(&self, task_id: &TaskId, user_id: &UserId, completed: bool) -> Result<Task, TaskError> {
        self.db.with_tx(|tx| {
            let task = load_owned(tx, task_id, user_id)?;
            apply_completion(tx, &task, user_id, CompletionState::from_flag(completed))
        })
    }

    /// A user's completed tasks, most recently completed first.
    pub fn get_completed_tasks(&self, user_id: &UserId, limit: usize) -> Result<Vec<Task>, TaskError> {
        self.db
            .with_conn(|conn| TaskRepository::list_completed(conn, user_id, limit))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────

    /// Pending tasks grouped by bucket, nested under their pending parents.
    ///
    /// A pending task whose parent is completed (or sits in another bucket)
    /// is listed as a root.
    #[instrument(skip(self), fields(user = %user_id))]
    pub fn get_bucketed_hierarchical(&self, user_id: &UserId) -> Result<BucketedTasks, TaskError> {
        let tasks = self.db.with_conn(|conn| TaskRepository::list_for_user(conn, user_id))?;
        let pending: Vec<&Task> = tasks.iter().filter(|t| t.is_pending()).collect();
        let by_id: HashMap<&TaskId, &Task> = pending.iter().map(|t| (&t.id, *t)).collect();

        let mut children: HashMap<&TaskId, Vec<&Task>> = HashMap::new();
        let mut roots: Vec<&Task> = Vec::new();
        for task in &pending {
            match task.parent_task_id.as_ref().and_then(|p| by_id.get(p)) {
                Some(parent) if parent.bucket() == task.bucket() => {
                    children.entry(&parent.id).or_default().push(task);
                }
                _ => roots.push(task),
            }
        }

        let mut out = BucketedTasks::default();
        let mut seen: HashSet<&TaskId> = HashSet::new();
        for root in roots {
            if let Some(node) = build_node(root, &children, &mut seen) {
                out.get_mut(root.bucket()).push(node);
            }
        }
        debug!(pending = pending.len(), "bucketed listing built");
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers shared with the reorder and reference modules
// ─────────────────────────────────────────────────────────────────────────────

/// Load a task the caller must own: `NotFound` when missing, `Forbidden`
/// when it belongs to someone else.
pub(crate) fn load_owned(conn: &Connection, id: &TaskId, user_id: &UserId) -> Result<Task, TaskError> {
    let task = TaskRepository::get_task(conn, id)?.ok_or_else(|| TaskError::task_not_found(id))?;
    if task.user_id != *user_id {
        return Err(TaskError::task_forbidden(id));
    }
    Ok(task)
}

/// Parent/child index over `tasks`.
pub(crate) fn tree_of(tasks: &[Task]) -> TaskTree {
    TaskTree::build(tasks.iter().map(|t| TreeLink {
        id: t.id.clone(),
        parent_id: t.parent_task_id.clone(),
        completed: t.completed,
    }))
}

/// Key `task` into `run` at `at`, insert it, and persist any rebalanced
/// sibling keys.
pub(crate) fn insert_placed(
    conn: &Connection,
    ranker: &Ranker,
    task: &mut Task,
    run: &[(TaskId, quill_core::RankKey)],
    at: usize,
) -> Result<(), TaskError> {
    let placement = place_block(ranker, run, at, std::slice::from_ref(&task.id))?;
    if let Some(key) = placement.key_of(&task.id) {
        task.lexo_priority = key.clone();
    }
    TaskRepository::insert_task(conn, task)?;
    let _ = write_placement(conn, &task.user_id, &placement, Some(&task.id))?;
    Ok(())
}

fn apply_completion(
    conn: &Connection,
    task: &Task,
    user_id: &UserId,
    target: CompletionState,
) -> Result<Task, TaskError> {
    let tasks = TaskRepository::list_for_user(conn, user_id)?;
    let tree = tree_of(&tasks);
    let transition = gate::evaluate(&tree, &task.id, target, chrono::Utc::now())?;

    let Some((completed, at)) = transition.fields() else {
        debug!("completion unchanged");
        return Ok(task.clone());
    };
    let completed_at = at.map(format_timestamp);
    if TaskRepository::set_completion(conn, user_id, &task.id, completed, completed_at.as_deref(), &now_iso())? != 1 {
        return Err(TaskError::task_forbidden(&task.id));
    }
    info!(completed, "completion changed");
    load_owned(conn, &task.id, user_id)
}

/// `block` reordered to match the current rank order (first id stays first).
fn order_block(tasks: &[Task], block: &[TaskId]) -> Vec<TaskId> {
    let Some((head, rest)) = block.split_first() else {
        return Vec::new();
    };
    let rest: HashSet<&TaskId> = rest.iter().collect();
    std::iter::once(head.clone())
        .chain(tasks.iter().filter(|t| rest.contains(&t.id)).map(|t| t.id.clone()))
        .collect()
}

fn build_node<'a>(
    task: &'a Task,
    children: &HashMap<&'a TaskId, Vec<&'a Task>>,
    seen: &mut HashSet<&'a TaskId>,
) -> Option<TaskNode> {
    if !seen.insert(&task.id) {
        return None;
    }
    let kids = children
        .get(&task.id)
        .map(|list| list.iter().filter_map(|c| build_node(c, children, seen)).collect())
        .unwrap_or_default();
    Some(TaskNode {
        task: task.clone(),
        bucket: task.bucket(),
        children: kids,
    })
}

pub(crate) fn clean_title(raw: &str) -> Result<String, TaskError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TaskError::Validation("title is required".into()));
    }
    Ok(title.to_string())
}

pub(crate) fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
