//! SQL DDL for the task tables.
//!
//! Creates `reference_tasks`, `tasks`, and `schema_version`. Idempotent, so
//! [`run_migrations`] runs on every open.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::TaskError;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Connection pragmas. `busy_timeout` is set separately from settings.
pub const PRAGMAS: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
";

/// Run all migrations and record the schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), TaskError> {
    conn.execute_batch(SCHEMA)?;
    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if version.is_none() {
        let _ = conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

const SCHEMA: &str = r"
-- Recurring templates
CREATE TABLE IF NOT EXISTS reference_tasks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    journal_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    recurrence_type TEXT NOT NULL
        CHECK(recurrence_type IN ('daily', 'weekly', 'monthly', 'yearly', 'custom')),
    recurrence_interval INTEGER NOT NULL DEFAULT 1 CHECK(recurrence_interval >= 1),
    days_of_week TEXT NOT NULL DEFAULT '[]',
    day_of_month INTEGER CHECK(day_of_month BETWEEN 1 AND 31),
    week_of_month INTEGER CHECK(week_of_month BETWEEN 1 AND 5),
    starts_on TEXT NOT NULL,
    ends_on TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    next_scheduled_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reference_tasks_user
    ON reference_tasks(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_reference_tasks_due
    ON reference_tasks(next_scheduled_date, is_active);

-- Tasks
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    journal_id TEXT NOT NULL,
    parent_task_id TEXT REFERENCES tasks(id) ON DELETE CASCADE,
    reference_task_id TEXT REFERENCES reference_tasks(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    description TEXT,
    recurrence_type TEXT
        CHECK(recurrence_type IN ('daily', 'weekly', 'monthly', 'yearly', 'custom')),
    recurrence_interval INTEGER,
    scheduled_date TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    lexo_priority TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK(parent_task_id IS NULL OR parent_task_id != id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_lexo_priority
    ON tasks(lexo_priority);
CREATE INDEX IF NOT EXISTS idx_tasks_user_pending_order
    ON tasks(user_id, completed, lexo_priority);
CREATE INDEX IF NOT EXISTS idx_tasks_parent
    ON tasks(parent_task_id);
CREATE INDEX IF NOT EXISTS idx_tasks_user_completed_at
    ON tasks(user_id, completed_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_reference_instance
    ON tasks(reference_task_id, scheduled_date)
    WHERE reference_task_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
";

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let tables = table_names(&conn);
        for expected in ["reference_tasks", "schema_version", "tasks"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn idempotent_with_single_version_row() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn self_parent_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO tasks (id, user_id, journal_id, parent_task_id, title, lexo_priority, created_at, updated_at)
             VALUES ('t', 'u', 'j', 't', 'x', 'i', 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
