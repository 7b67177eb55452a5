#![allow(missing_docs, unused_results)]

mod common;

use assert_matches::assert_matches;
use common::{add, add_sub, alice, service, titles};
use quill_core::Bucket;
use quill_tasks::{DEFAULT_COMPLETED_LIMIT, TaskError};

#[test]
fn parent_waits_for_both_children() {
    let svc = service();
    let user = alice();
    let parent = add(&svc, &user, "Parent");
    let first = add_sub(&svc, &user, &parent, "First");
    let second = add_sub(&svc, &user, &parent, "Second");

    let blocked = svc.toggle_completion(&parent.id, &user).unwrap();
    assert!(!blocked.can_complete);
    assert!(!blocked.completed);
    assert_eq!(
        blocked.error.as_deref(),
        Some("Cannot complete task: 2 sub-task(s) remain incomplete")
    );
    assert!(svc.get_task(&parent.id, &user).unwrap().completed_at.is_none());

    svc.toggle_completion(&first.id, &user).unwrap();
    let still_blocked = svc.toggle_completion(&parent.id, &user).unwrap();
    assert!(!still_blocked.can_complete);

    svc.toggle_completion(&second.id, &user).unwrap();
    let done = svc.toggle_completion(&parent.id, &user).unwrap();
    assert!(done.can_complete);
    assert!(done.completed);
    assert!(done.task.completed_at.is_some());
}

#[test]
fn grandchild_blocks_top_level() {
    let svc = service();
    let user = alice();
    let top = add(&svc, &user, "Top");
    let child = add_sub(&svc, &user, &top, "Child");
    let grandchild = add_sub(&svc, &user, &child, "Grandchild");
    svc.set_completion(&grandchild.id, &user, true).unwrap();
    svc.set_completion(&child.id, &user, true).unwrap();
    svc.set_completion(&grandchild.id, &user, false).unwrap();

    let err = svc.set_completion(&top.id, &user, true).unwrap_err();
    assert_matches!(
        err,
        TaskError::BlockedByIncompleteChildren { ref blocking, .. } if blocking == &vec![grandchild.id.clone()]
    );
    assert_eq!(
        err.to_string(),
        format!("Cannot complete task {}: 1 sub-task(s) remain incomplete", top.id)
    );
}

#[test]
fn completion_never_cascades() {
    let svc = service();
    let user = alice();
    let parent = add(&svc, &user, "Parent");
    let child = add_sub(&svc, &user, &parent, "Child");
    svc.set_completion(&child.id, &user, true).unwrap();

    // Completing every child leaves the parent pending.
    assert!(!svc.get_task(&parent.id, &user).unwrap().completed);

    svc.set_completion(&parent.id, &user, true).unwrap();
    svc.set_completion(&parent.id, &user, false).unwrap();

    // Reopening the parent leaves the child completed.
    assert!(svc.get_task(&child.id, &user).unwrap().completed);
}

#[test]
fn completed_list_is_most_recent_first() {
    let svc = service();
    let user = alice();
    let a = add(&svc, &user, "A");
    let b = add(&svc, &user, "B");
    add(&svc, &user, "C");
    svc.set_completion(&a.id, &user, true).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    svc.set_completion(&b.id, &user, true).unwrap();

    let completed = svc.get_completed_tasks(&user, DEFAULT_COMPLETED_LIMIT).unwrap();
    let order: Vec<&str> = completed.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(order, ["B", "A"]);
    assert_eq!(svc.get_completed_tasks(&user, 1).unwrap().len(), 1);
    assert_eq!(titles(&svc, &user, Bucket::Regular), ["C"]);
}

#[test]
fn reopened_task_rejoins_the_order_at_its_key() {
    let svc = service();
    let user = alice();
    let a = add(&svc, &user, "A");
    add(&svc, &user, "B");
    svc.set_completion(&a.id, &user, true).unwrap();
    svc.set_completion(&a.id, &user, false).unwrap();
    assert_eq!(titles(&svc, &user, Bucket::Regular), ["B", "A"]);
}
