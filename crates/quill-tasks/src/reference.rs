//! Recurring templates and daily instance generation.

use std::collections::HashSet;

use chrono::NaiveDate;
use quill_core::{RankKey, ReferenceTaskId, TaskId, UserId};
use rusqlite::Connection;
use tracing::{debug, info, instrument};

use crate::errors::TaskError;
use crate::reorder::bucket_run;
use crate::repository::{ReferenceTaskRepository, TaskRepository, now_iso};
use crate::service::{TaskService, clean_text, clean_title, insert_placed};
use crate::types::{
    GenerationReport, ReferenceTask, ReferenceTaskCreateParams, ReferenceTaskUpdateParams, Task,
};

impl TaskService {
    /// Create a recurring template. `today` seeds its next due date.
    #[instrument(skip(self, params), fields(user = %user_id, kind = %params.rule.kind))]
    pub fn create_reference_task(
        &self,
        user_id: &UserId,
        params: &ReferenceTaskCreateParams,
        today: NaiveDate,
    ) -> Result<ReferenceTask, TaskError> {
        let now = now_iso();
        let mut reference = ReferenceTask {
            id: ReferenceTaskId::new(),
            user_id: user_id.clone(),
            journal_id: params.journal_id.clone(),
            title: clean_title(&params.title)?,
            description: clean_text(params.description.as_deref()),
            rule: params.rule.clone(),
            starts_on: params.starts_on,
            ends_on: params.ends_on,
            is_active: true,
            next_scheduled_date: None,
            created_at: now.clone(),
            updated_at: now,
        };
        schedule(&mut reference, today)?;

        self.db.with_tx(|tx| {
            ReferenceTaskRepository::insert(tx, &reference)?;
            info!(reference = %reference.id, next = ?reference.next_scheduled_date, "reference task created");
            Ok(reference)
        })
    }

    /// Apply a partial update and recompute the next due date from `today`.
    #[instrument(skip(self, params), fields(reference = %id, user = %user_id))]
    pub fn update_reference_task(
        &self,
        id: &ReferenceTaskId,
        user_id: &UserId,
        params: &ReferenceTaskUpdateParams,
        today: NaiveDate,
    ) -> Result<ReferenceTask, TaskError> {
        self.db.with_tx(|tx| {
            let mut reference = load_owned_reference(tx, id, user_id)?;
            if let Some(title) = &params.title {
                reference.title = clean_title(title)?;
            }
            if let Some(description) = &params.description {
                reference.description = clean_text(description.as_deref());
            }
            if let Some(rule) = &params.rule {
                reference.rule = rule.clone();
            }
            if let Some(starts_on) = params.starts_on {
                reference.starts_on = starts_on;
            }
            if let Some(ends_on) = params.ends_on {
                reference.ends_on = ends_on;
            }
            if let Some(active) = params.is_active {
                reference.is_active = active;
            }
            reference.updated_at = now_iso();
            schedule(&mut reference, today)?;

            if ReferenceTaskRepository::update(tx, &reference)? != 1 {
                return Err(TaskError::reference_forbidden(id));
            }
            info!(next = ?reference.next_scheduled_date, active = reference.is_active, "reference task updated");
            Ok(reference)
        })
    }

    /// Get a template the caller owns.
    pub fn get_reference_task(&self, id: &ReferenceTaskId, user_id: &UserId) -> Result<ReferenceTask, TaskError> {
        self.db.with_conn(|conn| load_owned_reference(conn, id, user_id))
    }

    /// A user's templates, newest first.
    pub fn list_reference_tasks(&self, user_id: &UserId) -> Result<Vec<ReferenceTask>, TaskError> {
        self.db
            .with_conn(|conn| ReferenceTaskRepository::list_for_user(conn, user_id))
    }

    /// Delete a template. Instances already generated are kept.
    #[instrument(skip(self), fields(reference = %id, user = %user_id))]
    pub fn delete_reference_task(&self, id: &ReferenceTaskId, user_id: &UserId) -> Result<bool, TaskError> {
        self.db.with_tx(|tx| {
            let deleted = ReferenceTaskRepository::delete(tx, user_id, id)? > 0;
            if deleted {
                info!("reference task deleted");
            }
            Ok(deleted)
        })
    }

    /// Create the instances due on `date`, then advance each template.
    ///
    /// Runs in one transaction. A template that already has an instance for
    /// `date` is skipped but still advanced, so a rerun is harmless.
    #[instrument(skip(self), fields(%date))]
    pub fn generate_due_tasks(&self, date: NaiveDate, user_id: Option<&UserId>) -> Result<GenerationReport, TaskError> {
        let ranker = self.ranker;
        self.db.with_tx(|tx| {
            let due = ReferenceTaskRepository::list_due(tx, date, user_id)?;
            let mut report = GenerationReport {
                date: Some(date),
                reference_tasks_processed: due.len(),
                ..GenerationReport::default()
            };
            let mut users: HashSet<&UserId> = HashSet::new();
            let now = now_iso();

            for reference in &due {
                let _ = users.insert(&reference.user_id);

                if TaskRepository::instance_exists(tx, &reference.id, date)? {
                    debug!(reference = %reference.id, "instance already exists");
                    report.tasks_skipped += 1;
                } else {
                    let mut task = instance_of(reference, date, &now);
                    let tasks = TaskRepository::list_for_user(tx, &reference.user_id)?;
                    let run = bucket_run(&tasks, task.bucket());
                    let bottom = run.len();
                    insert_placed(tx, &ranker, &mut task, &run, bottom)?;
                    debug!(reference = %reference.id, task = %task.id, key = %task.lexo_priority, "instance created");
                    report.tasks_created += 1;
                }

                let next = date.succ_opt().and_then(|from| {
                    reference
                        .rule
                        .next_on_or_after(reference.starts_on, reference.ends_on, from)
                });
                if ReferenceTaskRepository::set_next_date(tx, &reference.id, next, &now)? != 1 {
                    return Err(TaskError::reference_not_found(&reference.id));
                }
            }

            report.users_processed = users.len();
            info!(
                created = report.tasks_created,
                skipped = report.tasks_skipped,
                users = report.users_processed,
                "generation finished"
            );
            Ok(report)
        })
    }
}

fn load_owned_reference(
    conn: &Connection,
    id: &ReferenceTaskId,
    user_id: &UserId,
) -> Result<ReferenceTask, TaskError> {
    let reference =
        ReferenceTaskRepository::get(conn, id)?.ok_or_else(|| TaskError::reference_not_found(id))?;
    if reference.user_id != *user_id {
        return Err(TaskError::reference_forbidden(id));
    }
    Ok(reference)
}

/// Validate the schedule and set the next due date on or after `today`.
fn schedule(reference: &mut ReferenceTask, today: NaiveDate) -> Result<(), TaskError> {
    reference.rule.validate().map_err(TaskError::Validation)?;
    if reference.ends_on.is_some_and(|end| end < reference.starts_on) {
        return Err(TaskError::Validation("end date is before start date".into()));
    }
    reference.next_scheduled_date =
        reference
            .rule
            .next_on_or_after(reference.starts_on, reference.ends_on, today);
    Ok(())
}

fn instance_of(reference: &ReferenceTask, date: NaiveDate, now: &str) -> Task {
    Task {
        id: TaskId::new(),
        user_id: reference.user_id.clone(),
        journal_id: reference.journal_id.clone(),
        parent_task_id: None,
        reference_task_id: Some(reference.id.clone()),
        title: reference.title.clone(),
        description: reference.description.clone(),
        recurrence_type: Some(reference.rule.kind),
        recurrence_interval: Some(reference.rule.interval),
        scheduled_date: Some(date),
        completed: false,
        completed_at: None,
        lexo_priority: RankKey::initial(),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}
