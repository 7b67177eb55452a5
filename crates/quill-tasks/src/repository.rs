//! SQL data access for tasks and reference tasks.
//!
//! All methods take a `&Connection` and are stateless: they translate between
//! Rust types and SQL and enforce nothing beyond what the `WHERE` clause says.
//! Writes filter on `user_id` as well as `id` and return the affected row
//! count, so callers can detect ownership mismatches.

use chrono::NaiveDate;
use quill_core::{RankKey, ReferenceTaskId, RecurrenceRule, TaskId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::TaskError;
use crate::row_helpers::{format_date, get, parse_date, parse_enum, parse_json, parse_rank};
use crate::types::{ReferenceTask, Task};

/// Current UTC timestamp as ISO 8601 with milliseconds.
pub(crate) fn now_iso() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Format a timestamp the way it is stored.
pub(crate) fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

const TASK_COLUMNS: &str = "id, user_id, journal_id, parent_task_id, reference_task_id, title, \
     description, recurrence_type, recurrence_interval, scheduled_date, completed, completed_at, \
     lexo_priority, created_at, updated_at";

const REFERENCE_COLUMNS: &str = "id, user_id, journal_id, title, description, recurrence_type, \
     recurrence_interval, days_of_week, day_of_month, week_of_month, starts_on, ends_on, \
     is_active, next_scheduled_date, created_at, updated_at";

/// Task repository.
pub struct TaskRepository;

impl TaskRepository {
    /// Insert a fully-populated task row.
    pub fn insert_task(conn: &Connection, task: &Task) -> Result<(), TaskError> {
        let _ = conn.execute(
            "INSERT INTO tasks (id, user_id, journal_id, parent_task_id, reference_task_id,
             title, description, recurrence_type, recurrence_interval, scheduled_date,
             completed, completed_at, lexo_priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                task.id.as_str(),
                task.user_id.as_str(),
                task.journal_id.as_str(),
                task.parent_task_id.as_ref().map(TaskId::as_str),
                task.reference_task_id.as_ref().map(ReferenceTaskId::as_str),
                task.title,
                task.description,
                task.recurrence_type.map(|r| r.as_sql()),
                task.recurrence_interval,
                task.scheduled_date.map(format_date),
                task.completed,
                task.completed_at,
                task.lexo_priority.as_str(),
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID regardless of owner.
    pub fn get_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>, TaskError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        conn.query_row(&sql, params![id.as_str()], |row| Ok(task_from_row(row)))
            .optional()?
            .transpose()
    }

    /// All of a user's tasks, in rank order (ties by creation time, then ID).
    pub fn list_for_user(conn: &Connection, user_id: &UserId) -> Result<Vec<Task>, TaskError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1
             ORDER BY lexo_priority, created_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.as_str()], |row| Ok(task_from_row(row)))?;
        rows.map(|r| r?).collect()
    }

    /// A user's completed tasks, most recently completed first.
    pub fn list_completed(
        conn: &Connection,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Task>, TaskError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND completed = 1
             ORDER BY completed_at DESC, id DESC LIMIT ?2"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.as_str(), limit], |row| Ok(task_from_row(row)))?;
        rows.map(|r| r?).collect()
    }

    /// Rewrite a task's rank key.
    pub fn update_rank(
        conn: &Connection,
        user_id: &UserId,
        id: &TaskId,
        key: &RankKey,
        now: &str,
    ) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "UPDATE tasks SET lexo_priority = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![key.as_str(), now, id.as_str(), user_id.as_str()],
        )?)
    }

    /// Write completion fields.
    pub fn set_completion(
        conn: &Connection,
        user_id: &UserId,
        id: &TaskId,
        completed: bool,
        completed_at: Option<&str>,
        now: &str,
    ) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "UPDATE tasks SET completed = ?1, completed_at = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![completed, completed_at, now, id.as_str(), user_id.as_str()],
        )?)
    }

    /// Change a task's parent.
    pub fn set_parent(
        conn: &Connection,
        user_id: &UserId,
        id: &TaskId,
        parent: Option<&TaskId>,
        now: &str,
    ) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "UPDATE tasks SET parent_task_id = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![parent.map(TaskId::as_str), now, id.as_str(), user_id.as_str()],
        )?)
    }

    /// Delete a task; sub-tasks go with it via `ON DELETE CASCADE`.
    pub fn delete_task(conn: &Connection, user_id: &UserId, id: &TaskId) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            params![id.as_str(), user_id.as_str()],
        )?)
    }

    /// Whether an instance of `reference_id` already exists for `date`.
    pub fn instance_exists(
        conn: &Connection,
        reference_id: &ReferenceTaskId,
        date: NaiveDate,
    ) -> Result<bool, TaskError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM tasks WHERE reference_task_id = ?1 AND scheduled_date = ?2",
                params![reference_id.as_str(), format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Reference task repository.
pub struct ReferenceTaskRepository;

impl ReferenceTaskRepository {
    /// Insert a template.
    pub fn insert(conn: &Connection, reference: &ReferenceTask) -> Result<(), TaskError> {
        let days = serde_json::to_string(&reference.rule.days_of_week)
            .map_err(|e| TaskError::Validation(format!("days of week: {e}")))?;
        let _ = conn.execute(
            "INSERT INTO reference_tasks (id, user_id, journal_id, title, description,
             recurrence_type, recurrence_interval, days_of_week, day_of_month, week_of_month,
             starts_on, ends_on, is_active, next_scheduled_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                reference.id.as_str(),
                reference.user_id.as_str(),
                reference.journal_id.as_str(),
                reference.title,
                reference.description,
                reference.rule.kind.as_sql(),
                reference.rule.interval,
                days,
                reference.rule.day_of_month,
                reference.rule.week_of_month,
                format_date(reference.starts_on),
                reference.ends_on.map(format_date),
                reference.is_active,
                reference.next_scheduled_date.map(format_date),
                reference.created_at,
                reference.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every mutable column of a template.
    pub fn update(conn: &Connection, reference: &ReferenceTask) -> Result<usize, TaskError> {
        let days = serde_json::to_string(&reference.rule.days_of_week)
            .map_err(|e| TaskError::Validation(format!("days of week: {e}")))?;
        Ok(conn.execute(
            "UPDATE reference_tasks SET title = ?1, description = ?2, recurrence_type = ?3,
             recurrence_interval = ?4, days_of_week = ?5, day_of_month = ?6, week_of_month = ?7,
             starts_on = ?8, ends_on = ?9, is_active = ?10, next_scheduled_date = ?11,
             updated_at = ?12
             WHERE id = ?13 AND user_id = ?14",
            params![
                reference.title,
                reference.description,
                reference.rule.kind.as_sql(),
                reference.rule.interval,
                days,
                reference.rule.day_of_month,
                reference.rule.week_of_month,
                format_date(reference.starts_on),
                reference.ends_on.map(format_date),
                reference.is_active,
                reference.next_scheduled_date.map(format_date),
                reference.updated_at,
                reference.id.as_str(),
                reference.user_id.as_str(),
            ],
        )?)
    }

    /// Get a template by ID regardless of owner.
    pub fn get(conn: &Connection, id: &ReferenceTaskId) -> Result<Option<ReferenceTask>, TaskError> {
        let sql = format!("SELECT {REFERENCE_COLUMNS} FROM reference_tasks WHERE id = ?1");
        conn.query_row(&sql, params![id.as_str()], |row| Ok(reference_from_row(row)))
            .optional()?
            .transpose()
    }

    /// A user's templates, newest first.
    pub fn list_for_user(conn: &Connection, user_id: &UserId) -> Result<Vec<ReferenceTask>, TaskError> {
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM reference_tasks WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.as_str()], |row| Ok(reference_from_row(row)))?;
        rows.map(|r| r?).collect()
    }

    /// Active templates due on `date`, optionally for one user, grouped by user.
    pub fn list_due(
        conn: &Connection,
        date: NaiveDate,
        user_id: Option<&UserId>,
    ) -> Result<Vec<ReferenceTask>, TaskError> {
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM reference_tasks
             WHERE is_active = 1 AND next_scheduled_date = ?1
               AND (?2 IS NULL OR user_id = ?2)
             ORDER BY user_id, created_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![format_date(date), user_id.map(UserId::as_str)],
            |row| Ok(reference_from_row(row)),
        )?;
        rows.map(|r| r?).collect()
    }

    /// Move a template's next due date.
    pub fn set_next_date(
        conn: &Connection,
        id: &ReferenceTaskId,
        next: Option<NaiveDate>,
        now: &str,
    ) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "UPDATE reference_tasks SET next_scheduled_date = ?1, updated_at = ?2 WHERE id = ?3",
            params![next.map(format_date), now, id.as_str()],
        )?)
    }

    /// Delete a template. Generated instances stay, detached.
    pub fn delete(conn: &Connection, user_id: &UserId, id: &ReferenceTaskId) -> Result<usize, TaskError> {
        Ok(conn.execute(
            "DELETE FROM reference_tasks WHERE id = ?1 AND user_id = ?2",
            params![id.as_str(), user_id.as_str()],
        )?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn task_from_row(row: &rusqlite::Row<'_>) -> Result<Task, TaskError> {
    const T: &str = "tasks";
    let recurrence_type: Option<String> = get(row, "recurrence_type", T)?;
    let scheduled_date: Option<String> = get(row, "scheduled_date", T)?;

    Ok(Task {
        id: TaskId::from_string(get::<String>(row, "id", T)?),
        user_id: UserId::from_string(get::<String>(row, "user_id", T)?),
        journal_id: get::<String>(row, "journal_id", T)?.into(),
        parent_task_id: get::<Option<String>>(row, "parent_task_id", T)?.map(TaskId::from),
        reference_task_id: get::<Option<String>>(row, "reference_task_id", T)?
            .map(ReferenceTaskId::from),
        title: get(row, "title", T)?,
        description: get(row, "description", T)?,
        recurrence_type: recurrence_type
            .map(|raw| parse_enum(&raw, T, "recurrence_type"))
            .transpose()?,
        recurrence_interval: get(row, "recurrence_interval", T)?,
        scheduled_date: scheduled_date
            .map(|raw| parse_date(&raw, T, "scheduled_date"))
            .transpose()?,
        completed: get(row, "completed", T)?,
        completed_at: get(row, "completed_at", T)?,
        lexo_priority: parse_rank(get(row, "lexo_priority", T)?, T, "lexo_priority")?,
        created_at: get(row, "created_at", T)?,
        updated_at: get(row, "updated_at", T)?,
    })
}

fn reference_from_row(row: &rusqlite::Row<'_>) -> Result<ReferenceTask, TaskError> {
    const T: &str = "reference_tasks";
    let kind: String = get(row, "recurrence_type", T)?;
    let days: String = get(row, "days_of_week", T)?;
    let starts_on: String = get(row, "starts_on", T)?;
    let ends_on: Option<String> = get(row, "ends_on", T)?;
    let next: Option<String> = get(row, "next_scheduled_date", T)?;

    Ok(ReferenceTask {
        id: ReferenceTaskId::from_string(get::<String>(row, "id", T)?),
        user_id: UserId::from_string(get::<String>(row, "user_id", T)?),
        journal_id: get::<String>(row, "journal_id", T)?.into(),
        title: get(row, "title", T)?,
        description: get(row, "description", T)?,
        rule: RecurrenceRule {
            kind: parse_enum(&kind, T, "recurrence_type")?,
            interval: get(row, "recurrence_interval", T)?,
            days_of_week: parse_json(&days, T, "days_of_week")?,
            day_of_month: get(row, "day_of_month", T)?,
            week_of_month: get(row, "week_of_month", T)?,
        },
        starts_on: parse_date(&starts_on, T, "starts_on")?,
        ends_on: ends_on.map(|raw| parse_date(&raw, T, "ends_on")).transpose()?,
        is_active: get(row, "is_active", T)?,
        next_scheduled_date: next
            .map(|raw| parse_date(&raw, T, "next_scheduled_date"))
            .transpose()?,
        created_at: get(row, "created_at", T)?,
        updated_at: get(row, "updated_at", T)?,
    })
}
