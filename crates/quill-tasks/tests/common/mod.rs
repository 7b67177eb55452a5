#![allow(dead_code, missing_docs, unused_results)]

use chrono::NaiveDate;
use quill_core::{
    Bucket, JournalId, Ranker, RecurrenceRule, RecurrenceType, TaskId, UserId,
};
use quill_tasks::{
    Database, ReferenceTaskCreateParams, SubtaskCreateParams, Task, TaskCreateParams, TaskService,
};

pub fn service() -> TaskService {
    TaskService::new(Database::in_memory().unwrap(), Ranker::default())
}

pub fn alice() -> UserId {
    UserId::from("alice")
}

pub fn bob() -> UserId {
    UserId::from("bob")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn add(svc: &TaskService, user: &UserId, title: &str) -> Task {
    svc.create_task(
        user,
        &TaskCreateParams {
            journal_id: JournalId::from("journal"),
            title: title.into(),
            description: None,
        },
    )
    .unwrap()
}

pub fn add_sub(svc: &TaskService, user: &UserId, parent: &Task, title: &str) -> Task {
    svc.create_subtask(
        &parent.id,
        user,
        &SubtaskCreateParams {
            title: title.into(),
            description: None,
        },
    )
    .unwrap()
}

/// Create a template of `kind` starting on `day` and generate its first instance.
pub fn add_recurring(
    svc: &TaskService,
    user: &UserId,
    kind: RecurrenceType,
    title: &str,
    day: NaiveDate,
) -> Task {
    let reference = svc
        .create_reference_task(
            user,
            &ReferenceTaskCreateParams {
                journal_id: JournalId::from("journal"),
                title: title.into(),
                description: None,
                rule: RecurrenceRule::every(kind, 1),
                starts_on: day,
                ends_on: None,
            },
            day,
        )
        .unwrap();
    svc.generate_due_tasks(day, Some(user)).unwrap();
    let listing = svc.get_bucketed_hierarchical(user).unwrap();
    listing
        .get(Bucket::classify(Some(kind)))
        .iter()
        .map(|node| node.task.clone())
        .find(|task| task.reference_task_id.as_ref() == Some(&reference.id))
        .unwrap()
}

/// Titles of `bucket` in display order.
pub fn titles(svc: &TaskService, user: &UserId, bucket: Bucket) -> Vec<String> {
    let listing = svc.get_bucketed_hierarchical(user).unwrap();
    listing
        .flatten_ids(bucket)
        .iter()
        .map(|id| svc.get_task(id, user).unwrap().title)
        .collect()
}

/// Overwrite a task's key, bypassing the allocator.
pub fn force_key(svc: &TaskService, id: &TaskId, key: &str) {
    svc.database()
        .with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET lexo_priority = ?1 WHERE id = ?2",
                rusqlite::params![key, id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();
}

/// Every task's key for `user`, keyed by title.
pub fn keys(svc: &TaskService, user: &UserId) -> Vec<(String, String)> {
    svc.database()
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title, lexo_priority FROM tasks WHERE user_id = ?1 ORDER BY title",
            )?;
            let rows = stmt
                .query_map([user.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap()
}

/// Pending titles for `user` in raw key order, ignoring nesting.
pub fn key_order(svc: &TaskService, user: &UserId) -> Vec<String> {
    svc.database()
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title FROM tasks WHERE user_id = ?1 AND completed = 0 ORDER BY lexo_priority",
            )?;
            let rows = stmt
                .query_map([user.as_str()], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap()
}
