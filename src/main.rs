//! # quill
//!
//! Command-line front end for the task engine. Every command prints its
//! result as JSON on stdout; logs go to stderr.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use quill_core::{JournalId, Ranker, RecurrenceRule, RecurrenceType, ReferenceTaskId, TaskId, UserId};
use quill_settings::{QuillSettings, expand_home};
use quill_tasks::{
    DEFAULT_COMPLETED_LIMIT, Database, Position, ReferenceTaskCreateParams, ReferenceTaskUpdateParams,
    SubtaskCreateParams, TaskCreateParams, TaskService,
};
use quill_telemetry::{TelemetryConfig, init_telemetry};
use serde::Serialize;
use tracing::debug;

/// Journal task ordering.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Journal task ordering and bucketing")]
struct Cli {
    /// Acting user.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `info,quill_tasks=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a top-level task.
    Add {
        title: String,
        #[arg(long, default_value = "default")]
        journal: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a sub-task under PARENT.
    Subtask {
        parent: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Pending tasks grouped by bucket.
    List,
    /// Completed tasks, most recent first.
    Completed {
        #[arg(long, default_value_t = DEFAULT_COMPLETED_LIMIT)]
        limit: usize,
    },
    /// Flip a task's completion state.
    Toggle { id: String },
    /// Move a task above or below another.
    Move {
        id: String,
        #[arg(long, conflicts_with = "below", required_unless_present = "below")]
        above: Option<String>,
        #[arg(long)]
        below: Option<String>,
        /// Sub-tasks to carry (default: all pending sub-tasks).
        #[arg(long = "with", value_delimiter = ',')]
        with: Vec<String>,
    },
    /// Put a task under PARENT, or at top level without one.
    Reparent {
        id: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a task and its sub-tasks.
    Delete { id: String },
    /// Recurring templates.
    #[command(subcommand)]
    Recurring(RecurringCommand),
    /// Create the instances due on a date.
    Generate {
        /// Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Generate for every user instead of `--user` only.
        #[arg(long)]
        all_users: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RecurringCommand {
    /// Create a template.
    Add {
        title: String,
        /// daily, weekly, monthly, yearly or custom.
        #[arg(long)]
        kind: RecurrenceType,
        #[arg(long, default_value_t = 1)]
        interval: u32,
        /// Weekdays, 0 = Sunday.
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,
        #[arg(long)]
        day_of_month: Option<u8>,
        /// 1-4, or 5 for the last week.
        #[arg(long)]
        week_of_month: Option<u8>,
        /// Defaults to today.
        #[arg(long)]
        starts_on: Option<NaiveDate>,
        #[arg(long)]
        ends_on: Option<NaiveDate>,
        #[arg(long, default_value = "default")]
        journal: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// The user's templates, newest first.
    List,
    /// Pause or resume a template.
    SetActive {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Delete a template. Generated tasks are kept.
    Delete { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = quill_settings::get_settings();

    let directive = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    let _telemetry = init_telemetry(&TelemetryConfig::from_directive(
        directive,
        cli.json_logs || settings.logging.json,
    ));

    let service = open_service(settings, cli.db.as_deref())?;
    run(&service, &UserId::from(cli.user), cli.command)
}

fn open_service(settings: &QuillSettings, db: Option<&std::path::Path>) -> Result<TaskService> {
    let path = db.map_or_else(|| expand_home(&settings.database.path), std::path::Path::to_path_buf);
    let database = Database::open(&path, Duration::from_millis(settings.database.busy_timeout_ms))
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    debug!(path = %path.display(), max_key_length = settings.ranking.max_key_length, "service ready");
    Ok(TaskService::new(database, Ranker::new(settings.ranking.max_key_length)))
}

fn run(service: &TaskService, user: &UserId, command: Command) -> Result<()> {
    match command {
        Command::Add {
            title,
            journal,
            description,
        } => print_json(&service.create_task(
            user,
            &TaskCreateParams {
                journal_id: JournalId::from(journal),
                title,
                description,
            },
        )?),
        Command::Subtask {
            parent,
            title,
            description,
        } => print_json(&service.create_subtask(
            &TaskId::from(parent),
            user,
            &SubtaskCreateParams { title, description },
        )?),
        Command::List => print_json(&service.get_bucketed_hierarchical(user)?),
        Command::Completed { limit } => print_json(&service.get_completed_tasks(user, limit)?),
        Command::Toggle { id } => print_json(&service.toggle_completion(&TaskId::from(id), user)?),
        Command::Move {
            id,
            above,
            below,
            with,
        } => {
            let (reference, position) = match (above, below) {
                (Some(reference), _) => (reference, Position::Above),
                (None, Some(reference)) => (reference, Position::Below),
                (None, None) => anyhow::bail!("one of --above or --below is required"),
            };
            let carried: Vec<TaskId> = with.into_iter().map(TaskId::from).collect();
            let report = service.reorder_with_report(
                &TaskId::from(id),
                user,
                &TaskId::from(reference),
                position,
                (!carried.is_empty()).then_some(carried.as_slice()),
            )?;
            print_json(&report)
        }
        Command::Reparent { id, parent } => {
            let parent = parent.map(TaskId::from);
            print_json(&service.reparent(&TaskId::from(id), user, parent.as_ref())?)
        }
        Command::Delete { id } => print_json(&serde_json::json!({
            "deleted": service.delete_task(&TaskId::from(id), user)?
        })),
        Command::Recurring(command) => run_recurring(service, user, command),
        Command::Generate { date, all_users } => {
            let date = date.unwrap_or_else(today);
            let report = service.generate_due_tasks(date, (!all_users).then_some(user))?;
            print_json(&report)
        }
    }
}

fn run_recurring(service: &TaskService, user: &UserId, command: RecurringCommand) -> Result<()> {
    match command {
        RecurringCommand::Add {
            title,
            kind,
            interval,
            days,
            day_of_month,
            week_of_month,
            starts_on,
            ends_on,
            journal,
            description,
        } => {
            let params = ReferenceTaskCreateParams {
                journal_id: JournalId::from(journal),
                title,
                description,
                rule: RecurrenceRule {
                    kind,
                    interval,
                    days_of_week: days,
                    day_of_month,
                    week_of_month,
                },
                starts_on: starts_on.unwrap_or_else(today),
                ends_on,
            };
            print_json(&service.create_reference_task(user, &params, today())?)
        }
        RecurringCommand::List => print_json(&service.list_reference_tasks(user)?),
        RecurringCommand::SetActive { id, active } => {
            let params = ReferenceTaskUpdateParams {
                is_active: Some(active),
                ..ReferenceTaskUpdateParams::default()
            };
            print_json(&service.update_reference_task(&ReferenceTaskId::from(id), user, &params, today())?)
        }
        RecurringCommand::Delete { id } => print_json(&serde_json::json!({
            "deleted": service.delete_reference_task(&ReferenceTaskId::from(id), user)?
        })),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn move_requires_a_direction() {
        assert!(Cli::try_parse_from(["quill", "move", "task-1"]).is_err());
        assert!(Cli::try_parse_from(["quill", "move", "task-1", "--above", "a", "--below", "b"]).is_err());
        let cli = Cli::try_parse_from(["quill", "--user", "u", "move", "task-1", "--below", "b", "--with", "c1,c2"])
            .unwrap();
        match cli.command {
            Command::Move { below, with, .. } => {
                assert_eq!(below.as_deref(), Some("b"));
                assert_eq!(with, ["c1", "c2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn recurring_add_parses_rule_fields() {
        let cli = Cli::try_parse_from([
            "quill", "recurring", "add", "Gym", "--kind", "weekly", "--days", "1,3", "--starts-on", "2024-01-01",
        ])
        .unwrap();
        match cli.command {
            Command::Recurring(RecurringCommand::Add { kind, days, starts_on, .. }) => {
                assert_eq!(kind, RecurrenceType::Weekly);
                assert_eq!(days, [1, 3]);
                assert_eq!(starts_on, NaiveDate::from_ymd_opt(2024, 1, 1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn commands_run_against_a_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let settings = QuillSettings::default();
        let service = open_service(&settings, Some(dir.path().join("quill.db").as_path())).unwrap();
        let user = UserId::from("u");
        run(
            &service,
            &user,
            Command::Add {
                title: "Write".into(),
                journal: "j".into(),
                description: None,
            },
        )
        .unwrap();
        run(&service, &user, Command::Generate { date: None, all_users: true }).unwrap();
        assert_eq!(service.get_bucketed_hierarchical(&user).unwrap().regular.len(), 1);
    }
}
