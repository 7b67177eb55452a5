//! Branded ID newtypes for type safety.
//!
//! Tasks, reference tasks, journals, and users each get a distinct newtype
//! around `String` so a journal ID can never be passed where a task ID is
//! expected. Generated IDs are prefixed UUID v7 values (time-ordered).
//! `UserId` and `JournalId` are normally minted by the auth and journal
//! layers and arrive here through [`from_string`](TaskId::from_string).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (prefixed UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::now_v7()))
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a task row.
    TaskId, "task"
}

branded_id! {
    /// Unique identifier for a recurring template ("reference task").
    ReferenceTaskId, "rtask"
}

branded_id! {
    /// Identifier of the journal that owns a task.
    JournalId, "journal"
}

branded_id! {
    /// Identifier of an authenticated user.
    UserId, "user"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_has_prefix() {
        let id = TaskId::new();
        assert!(id.as_str().starts_with("task-"), "got: {id}");
    }

    #[test]
    fn reference_task_id_has_prefix() {
        let id = ReferenceTaskId::new();
        assert!(id.as_str().starts_with("rtask-"), "got: {id}");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn from_string_preserves_value() {
        let id = UserId::from_string("42");
        assert_eq!(id.as_str(), "42");
        assert_eq!(String::from(id), "42");
    }

    #[test]
    fn serde_is_transparent() {
        let id = JournalId::from("journal-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"journal-1\"");
        let parsed: JournalId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
