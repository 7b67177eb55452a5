//! Reorder engine.
//!
//! Moves a task, with its pending sub-tasks as one contiguous block, directly
//! above or below a reference task within the bucket's pending order. All
//! reads and writes happen in one `IMMEDIATE` transaction, so neighbor keys
//! are always the latest committed ones.
//!
//! The reference is resolved to the moving task's level first: a reference
//! nested under another task stands for its ancestor that is a sibling of the
//! moving task, so a move never lands inside someone else's subtree.
//!
//! Only the moved block gets new keys, unless the gap between its neighbors
//! is exhausted: then the whole pending run of the bucket is respaced with
//! [`Ranker::spread`] and the block is slotted in by the same pass.

use std::collections::{HashMap, HashSet};

use quill_core::{Bucket, RankKey, Ranker, TaskId, TaskTree, UserId};
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::errors::TaskError;
use crate::repository::{TaskRepository, now_iso};
use crate::service::{TaskService, load_owned, tree_of};
use crate::types::{Position, ReorderReport, Task};

/// New keys for a block and, after a rebalance, for its siblings.
#[derive(Debug)]
pub(crate) struct Placement {
    pub(crate) keys: Vec<(TaskId, RankKey)>,
    pub(crate) rebalanced: bool,
}

impl Placement {
    pub(crate) fn key_of(&self, id: &TaskId) -> Option<&RankKey> {
        self.keys.iter().find(|(k, _)| k == id).map(|(_, key)| key)
    }
}

/// Pending `(id, key)` pairs of one bucket, top to bottom.
///
/// `tasks` must already be in rank order, as `list_for_user` returns them.
pub(crate) fn bucket_run(tasks: &[Task], bucket: Bucket) -> Vec<(TaskId, RankKey)> {
    tasks
        .iter()
        .filter(|t| t.is_pending() && t.bucket() == bucket)
        .map(|t| (t.id.clone(), t.lexo_priority.clone()))
        .collect()
}

/// Slot `block` into `run` before index `at`.
///
/// `run` must not contain any id from `block`.
pub(crate) fn place_block(
    ranker: &Ranker,
    run: &[(TaskId, RankKey)],
    at: usize,
    block: &[TaskId],
) -> Result<Placement, TaskError> {
    let at = at.min(run.len());
    let low = at.checked_sub(1).map(|i| &run[i].1);
    let high = run.get(at).map(|(_, key)| key);

    match ranker.run(low, high, block.len()) {
        Ok(keys) => Ok(Placement {
            keys: block.iter().cloned().zip(keys).collect(),
            rebalanced: false,
        }),
        Err(err) => {
            warn!(error = %err, siblings = run.len(), "no room between neighbors, rebalancing bucket");
            let order: Vec<(TaskId, Option<&RankKey>)> = run[..at]
                .iter()
                .map(|(id, key)| (id.clone(), Some(key)))
                .chain(block.iter().map(|id| (id.clone(), None)))
                .chain(run[at..].iter().map(|(id, key)| (id.clone(), Some(key))))
                .collect();
            let fresh = ranker.spread(order.len())?;
            let keys = order
                .into_iter()
                .zip(fresh)
                .filter(|((_, old), new)| *old != Some(new))
                .map(|((id, _), new)| (id, new))
                .collect();
            Ok(Placement {
                keys,
                rebalanced: true,
            })
        }
    }
}

/// Persist a placement. `skip` names a row that does not exist yet.
///
/// Any row that fails the ownership filter aborts the caller's transaction.
pub(crate) fn write_placement(
    conn: &Connection,
    user_id: &UserId,
    placement: &Placement,
    skip: Option<&TaskId>,
) -> Result<usize, TaskError> {
    let now = now_iso();
    let mut written = 0;
    for (id, key) in &placement.keys {
        if Some(id) == skip {
            continue;
        }
        if TaskRepository::update_rank(conn, user_id, id, key, &now)? != 1 {
            return Err(TaskError::task_forbidden(id));
        }
        written += 1;
    }
    Ok(written)
}

/// Index just past `anchor` and its pending descendants that follow it.
pub(crate) fn after_subtree(tree: &TaskTree, run: &[(TaskId, RankKey)], anchor: &TaskId) -> Option<usize> {
    let start = run.iter().position(|(id, _)| id == anchor)?;
    let last = run
        .iter()
        .enumerate()
        .skip(start + 1)
        .filter(|(_, (id, _))| tree.is_ancestor_of(anchor, id))
        .map(|(i, _)| i)
        .last()
        .unwrap_or(start);
    Some(last + 1)
}

impl TaskService {
    /// Move `task_id` (and its pending sub-tasks) above or below `reference_id`.
    ///
    /// Returns `true` once the new keys are committed.
    pub fn reorder(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        reference_id: &TaskId,
        position: Position,
        descendant_ids: Option<&[TaskId]>,
    ) -> Result<bool, TaskError> {
        self.reorder_with_report(task_id, user_id, reference_id, position, descendant_ids)
            .map(|report| !report.moved.is_empty())
    }

    /// [`reorder`](Self::reorder), returning what changed.
    #[instrument(skip_all, fields(task = %task_id, reference = %reference_id, user = %user_id, ?position))]
    pub fn reorder_with_report(
        &self,
        task_id: &TaskId,
        user_id: &UserId,
        reference_id: &TaskId,
        position: Position,
        descendant_ids: Option<&[TaskId]>,
    ) -> Result<ReorderReport, TaskError> {
        let ranker = self.ranker;
        self.db.with_tx(|tx| {
            let moving = load_owned(tx, task_id, user_id)?;
            let reference = TaskRepository::get_task(tx, reference_id)?
                .filter(|t| t.user_id == *user_id && t.is_pending())
                .ok_or_else(|| TaskError::task_not_found(reference_id))?;

            if moving.id == reference.id {
                return Err(TaskError::InvalidHierarchy(
                    "a task cannot be positioned relative to itself".into(),
                ));
            }
            if moving.completed {
                return Err(TaskError::Validation(
                    "completed tasks are not part of the manual order".into(),
                ));
            }

            let tasks = TaskRepository::list_for_user(tx, user_id)?;
            let tree = tree_of(&tasks);

            if tree.is_ancestor_of(&moving.id, &reference.id) {
                return Err(TaskError::InvalidHierarchy(format!(
                    "task {} cannot be positioned relative to its own sub-task {}",
                    moving.id, reference.id
                )));
            }
            let bucket = moving.bucket();
            if reference.bucket() != bucket {
                return Err(TaskError::Validation(format!(
                    "reference task is in the {} bucket, moving task is in {}",
                    reference.bucket(),
                    bucket
                )));
            }

            let carried = carried_set(tx, &tree, &moving.id, user_id, descendant_ids)?;
            let sequence = bucket_run(&tasks, bucket);
            let block: Vec<TaskId> = std::iter::once(moving.id.clone())
                .chain(
                    sequence
                        .iter()
                        .filter(|(id, _)| carried.contains(id))
                        .map(|(id, _)| id.clone()),
                )
                .collect();
            let in_block: HashSet<&TaskId> = block.iter().collect();
            let remaining: Vec<(TaskId, RankKey)> = sequence
                .iter()
                .filter(|(id, _)| !in_block.contains(id))
                .cloned()
                .collect();

            let pending: HashMap<&TaskId, &Task> = tasks
                .iter()
                .filter(|t| t.is_pending())
                .map(|t| (&t.id, t))
                .collect();
            let level = listed_parent(&pending, &moving);
            let index_of = |id: &TaskId| {
                remaining
                    .iter()
                    .position(|(other, _)| other == id)
                    .ok_or_else(|| TaskError::task_not_found(id))
            };
            let at = if level == Some(&reference.id) {
                // Relative to its own parent: only "below" stays inside the parent's subtree.
                match position {
                    Position::Above => {
                        return Err(TaskError::InvalidHierarchy(format!(
                            "sub-task {} cannot be placed above its parent {}",
                            moving.id, reference.id
                        )));
                    }
                    Position::Below => index_of(&reference.id)? + 1,
                }
            } else {
                let anchor = sibling_anchor(&pending, level, &reference).ok_or_else(|| {
                    TaskError::InvalidHierarchy(format!(
                        "task {} and reference {} do not share a parent level",
                        moving.id, reference.id
                    ))
                })?;
                let anchor_at = index_of(anchor)?;
                match position {
                    Position::Above => anchor_at,
                    Position::Below => after_subtree(&tree, &remaining, anchor).unwrap_or(anchor_at + 1),
                }
            };
            debug!(%bucket, at, block = block.len(), siblings = remaining.len(), "placing block");

            let placement = place_block(&ranker, &remaining, at, &block)?;
            let keys_written = write_placement(tx, user_id, &placement, None)?;

            info!(%bucket, moved = block.len(), keys_written, rebalanced = placement.rebalanced, "task reordered");
            Ok(ReorderReport {
                moved: block,
                keys_written,
                rebalanced: placement.rebalanced,
            })
        })
    }
}

/// Parent a pending task is listed under. `None` when the task is listed as
/// a root.
fn listed_parent<'a>(pending: &HashMap<&TaskId, &'a Task>, task: &Task) -> Option<&'a TaskId> {
    task.parent_task_id
        .as_ref()
        .and_then(|p| pending.get(p).copied())
        .filter(|parent| parent.bucket() == task.bucket())
        .map(|parent| &parent.id)
}

/// The reference itself, or its nearest listed ancestor, whose listed parent
/// is `level`.
fn sibling_anchor<'a>(
    pending: &HashMap<&TaskId, &'a Task>,
    level: Option<&TaskId>,
    reference: &Task,
) -> Option<&'a TaskId> {
    let mut current = *pending.get(&reference.id)?;
    for _ in 0..=pending.len() {
        let up = listed_parent(pending, current);
        if up == level {
            return Some(&current.id);
        }
        current = *pending.get(up?)?;
    }
    None
}

/// Pending descendants that travel with the moving task.
///
/// Caller-supplied ids are checked: unknown ids are `NotFound`, ids owned by
/// someone else are `Forbidden`, ids outside the subtree are `InvalidHierarchy`.
fn carried_set(
    conn: &Connection,
    tree: &TaskTree,
    moving: &TaskId,
    user_id: &UserId,
    explicit: Option<&[TaskId]>,
) -> Result<HashSet<TaskId>, TaskError> {
    let descendants: HashSet<TaskId> = tree.descendants_of(moving).into_iter().collect();
    let ids: Vec<TaskId> = match explicit {
        None => descendants.iter().cloned().collect(),
        Some(ids) => {
            for id in ids {
                if !tree.contains(id) {
                    return Err(match TaskRepository::get_task(conn, id)? {
                        Some(_) => TaskError::task_forbidden(id),
                        None => TaskError::task_not_found(id),
                    });
                }
                if !descendants.contains(id) {
                    return Err(TaskError::InvalidHierarchy(format!(
                        "task {id} is not a sub-task of {moving}"
                    )));
                }
            }
            ids.to_vec()
        }
    };
    Ok(ids
        .into_iter()
        .filter(|id| tree.is_completed(id) == Some(false))
        .collect())
}
