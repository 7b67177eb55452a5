//! Parent/child index over a user's tasks.
//!
//! A [`TaskTree`] is rebuilt from storage for every request and dropped at
//! the end of it. Traversals carry a visited set, so a corrupt parent chain
//! that loops terminates instead of spinning.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::TreeError;
use crate::ids::TaskId;

/// Deepest allowed nesting below top level (grandchildren, no deeper).
pub const MAX_DEPTH: usize = 2;

/// The parts of a task row the tree needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeLink {
    /// Task id.
    pub id: TaskId,
    /// Parent task, if any.
    pub parent_id: Option<TaskId>,
    /// Completion flag.
    pub completed: bool,
}

#[derive(Debug)]
struct Node {
    parent: Option<TaskId>,
    completed: bool,
}

/// Adjacency index from parent to children.
#[derive(Debug, Default)]
pub struct TaskTree {
    nodes: HashMap<TaskId, Node>,
    children: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskTree {
    /// Build the index. Children keep the order in which the links arrive.
    pub fn build(links: impl IntoIterator<Item = TreeLink>) -> Self {
        let mut tree = Self::default();
        for link in links {
            if let Some(parent) = &link.parent_id {
                tree.children
                    .entry(parent.clone())
                    .or_default()
                    .push(link.id.clone());
            }
            let _ = tree.nodes.insert(
                link.id,
                Node {
                    parent: link.parent_id,
                    completed: link.completed,
                },
            );
        }
        tree
    }

    /// Number of tasks in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is part of the tree.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Parent of `id`, if it has one.
    pub fn parent_of(&self, id: &TaskId) -> Option<&TaskId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Completion flag of `id`, or `None` when unknown.
    pub fn is_completed(&self, id: &TaskId) -> Option<bool> {
        self.nodes.get(id).map(|n| n.completed)
    }

    /// Direct children of `id`.
    pub fn children_of(&self, id: &TaskId) -> &[TaskId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Transitive descendants of `id`, nearest first. Excludes `id` itself.
    pub fn descendants_of(&self, id: &TaskId) -> Vec<TaskId> {
        let mut seen: HashSet<&TaskId> = HashSet::from([id]);
        let mut queue: VecDeque<&TaskId> = VecDeque::from([id]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                if seen.insert(child) {
                    out.push(child.clone());
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Whether `ancestor` appears on the parent chain of `id`.
    pub fn is_ancestor_of(&self, ancestor: &TaskId, id: &TaskId) -> bool {
        let mut seen: HashSet<&TaskId> = HashSet::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// Nesting level of `id`: 0 for a top-level task.
    pub fn depth_of(&self, id: &TaskId) -> usize {
        let mut seen: HashSet<&TaskId> = HashSet::from([id]);
        let mut depth = 0;
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            depth += 1;
            current = self.parent_of(parent);
        }
        depth
    }

    /// Levels below `id`: 0 for a leaf.
    pub fn subtree_height(&self, id: &TaskId) -> usize {
        let mut seen: HashSet<&TaskId> = HashSet::from([id]);
        let mut level = vec![id];
        let mut height = 0;
        loop {
            let next: Vec<&TaskId> = level
                .iter()
                .flat_map(|t| self.children_of(t))
                .filter(|c| seen.insert(*c))
                .collect();
            if next.is_empty() {
                return height;
            }
            height += 1;
            level = next;
        }
    }

    /// Pending descendants of `id`, nearest first.
    pub fn incomplete_descendants(&self, id: &TaskId) -> Vec<TaskId> {
        self.descendants_of(id)
            .into_iter()
            .filter(|d| self.is_completed(d) == Some(false))
            .collect()
    }

    /// Check that `id` may hang under `new_parent` without creating a cycle
    /// or nesting deeper than [`MAX_DEPTH`].
    pub fn check_attach(&self, id: &TaskId, new_parent: &TaskId) -> Result<(), TreeError> {
        for known in [id, new_parent] {
            if !self.contains(known) {
                return Err(TreeError::UnknownTask(known.clone()));
            }
        }
        if id == new_parent || self.is_ancestor_of(id, new_parent) {
            return Err(TreeError::Cycle {
                task_id: id.clone(),
                parent_id: new_parent.clone(),
            });
        }
        let depth = self.depth_of(new_parent) + 1 + self.subtree_height(id);
        if depth > MAX_DEPTH {
            return Err(TreeError::TooDeep {
                task_id: id.clone(),
                depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn link(id: &str, parent: Option<&str>, completed: bool) -> TreeLink {
        TreeLink {
            id: TaskId::from(id),
            parent_id: parent.map(TaskId::from),
            completed,
        }
    }

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    /// p ─┬─ a ── a1
    ///    └─ b
    /// q
    fn sample() -> TaskTree {
        TaskTree::build([
            link("p", None, false),
            link("a", Some("p"), true),
            link("b", Some("p"), false),
            link("a1", Some("a"), false),
            link("q", None, false),
        ])
    }

    #[test]
    fn descendants_are_nearest_first() {
        let tree = sample();
        assert_eq!(tree.descendants_of(&id("p")), vec![id("a"), id("b"), id("a1")]);
        assert!(tree.descendants_of(&id("q")).is_empty());
    }

    #[test]
    fn ancestor_relation() {
        let tree = sample();
        assert!(tree.is_ancestor_of(&id("p"), &id("a1")));
        assert!(tree.is_ancestor_of(&id("a"), &id("a1")));
        assert!(!tree.is_ancestor_of(&id("a1"), &id("p")));
        assert!(!tree.is_ancestor_of(&id("q"), &id("a1")));
        assert!(!tree.is_ancestor_of(&id("p"), &id("p")));
    }

    #[test]
    fn depth_and_height() {
        let tree = sample();
        assert_eq!(tree.depth_of(&id("p")), 0);
        assert_eq!(tree.depth_of(&id("a1")), 2);
        assert_eq!(tree.subtree_height(&id("p")), 2);
        assert_eq!(tree.subtree_height(&id("b")), 0);
    }

    #[test]
    fn incomplete_descendants_skip_completed() {
        let tree = sample();
        assert_eq!(tree.incomplete_descendants(&id("p")), vec![id("b"), id("a1")]);
    }

    #[test]
    fn corrupt_loop_terminates() {
        let tree = TaskTree::build([link("x", Some("y"), false), link("y", Some("x"), false)]);
        assert_eq!(tree.descendants_of(&id("x")), vec![id("y")]);
        assert!(tree.is_ancestor_of(&id("y"), &id("x")));
        assert!(!tree.is_ancestor_of(&id("z"), &id("x")));
        assert_eq!(tree.depth_of(&id("x")), 1);
    }

    #[test]
    fn attach_rejects_cycles() {
        let tree = sample();
        assert_matches!(
            tree.check_attach(&id("p"), &id("a1")),
            Err(TreeError::Cycle { .. })
        );
        assert_matches!(
            tree.check_attach(&id("q"), &id("q")),
            Err(TreeError::Cycle { .. })
        );
    }

    #[test]
    fn attach_rejects_depth_overflow() {
        let tree = sample();
        // q under a1 would be depth 3.
        assert_matches!(
            tree.check_attach(&id("q"), &id("a1")),
            Err(TreeError::TooDeep { depth: 3, .. })
        );
        // a (height 1) under b (depth 1) would put a1 at depth 3.
        assert_matches!(
            tree.check_attach(&id("a"), &id("b")),
            Err(TreeError::TooDeep { .. })
        );
        assert!(tree.check_attach(&id("q"), &id("b")).is_ok());
    }

    #[test]
    fn attach_unknown_task() {
        let tree = sample();
        assert_matches!(
            tree.check_attach(&id("nope"), &id("p")),
            Err(TreeError::UnknownTask(_))
        );
    }
}
