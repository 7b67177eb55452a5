//! Column decoding that reports bad data as [`TaskError::CorruptRow`].

use chrono::NaiveDate;
use quill_core::RankKey;

use crate::errors::TaskError;

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get a column value from a row, returning `CorruptRow` on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    column: &'static str,
    table: &'static str,
) -> Result<T, TaskError> {
    row.get(column).map_err(|e| TaskError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a string into an enum, returning `CorruptRow` on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, TaskError> {
    raw.parse().map_err(|_| TaskError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Parse a stored rank key.
pub fn parse_rank(raw: String, table: &'static str, column: &'static str) -> Result<RankKey, TaskError> {
    RankKey::parse(raw).map_err(|e| TaskError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a stored `YYYY-MM-DD` date.
pub fn parse_date(raw: &str, table: &'static str, column: &'static str) -> Result<NaiveDate, TaskError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| TaskError::CorruptRow {
        table,
        column,
        detail: format!("invalid date {raw:?}: {e}"),
    })
}

/// Parse a JSON column, returning `CorruptRow` on failure.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, TaskError> {
    serde_json::from_str(raw).map_err(|e| TaskError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

/// Format a date for storage.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::RecurrenceType;

    #[test]
    fn parse_enum_failure_names_column() {
        let result: Result<RecurrenceType, _> = parse_enum("hourly", "tasks", "recurrence_type");
        assert!(matches!(
            result,
            Err(TaskError::CorruptRow { table: "tasks", column: "recurrence_type", .. })
        ));
    }

    #[test]
    fn parse_rank_rejects_padding_suffix() {
        assert!(parse_rank("a0".into(), "tasks", "lexo_priority").is_err());
        assert_eq!(parse_rank("a1".into(), "tasks", "lexo_priority").unwrap().as_str(), "a1");
    }

    #[test]
    fn dates_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(format_date(date), "2024-02-29");
        assert_eq!(parse_date("2024-02-29", "tasks", "scheduled_date").unwrap(), date);
        assert!(parse_date("29/02/2024", "tasks", "scheduled_date").is_err());
    }

    #[test]
    fn parse_json_days() {
        let days: Vec<u8> = parse_json("[0,6]", "reference_tasks", "days_of_week").unwrap();
        assert_eq!(days, vec![0, 6]);
        assert!(parse_json::<Vec<u8>>("[", "reference_tasks", "days_of_week").is_err());
    }
}
