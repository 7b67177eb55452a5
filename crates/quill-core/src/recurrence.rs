//! Schedules for recurring template tasks.
//!
//! A [`RecurrenceRule`] is anchored at the template's `starts_on` date; the
//! interval counts days, Sunday-based weeks, calendar months, or calendar
//! years from that anchor depending on the kind.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::bucket::RecurrenceType;

/// Week-of-month value meaning "the last such weekday of the month".
pub const LAST_WEEK_OF_MONTH: u8 = 5;

/// When a recurring template produces instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    /// Cadence; also decides the bucket of generated instances.
    pub kind: RecurrenceType,
    /// Repeat every `interval` units of the cadence. At least 1.
    pub interval: u32,
    /// Weekdays, 0 = Sunday .. 6 = Saturday. Used by weekly rules and by
    /// monthly rules with a `week_of_month`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u8>,
    /// Day of month for monthly rules (1..=31, clamped to month length).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    /// Week of month for monthly rules (1..=5, 5 = last).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_of_month: Option<u8>,
}

impl RecurrenceRule {
    /// A rule of `kind` repeating every `interval` units with no extra fields.
    #[must_use]
    pub fn every(kind: RecurrenceType, interval: u32) -> Self {
        Self {
            kind,
            interval,
            days_of_week: Vec::new(),
            day_of_month: None,
            week_of_month: None,
        }
    }

    /// Check field ranges. Returns a human-readable message on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval == 0 {
            return Err("recurrence interval must be at least 1".into());
        }
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(format!("day of week out of range (0-6): {day}"));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(format!("day of month out of range (1-31): {day}"));
            }
        }
        if let Some(week) = self.week_of_month {
            if !(1..=LAST_WEEK_OF_MONTH).contains(&week) {
                return Err(format!("week of month out of range (1-5): {week}"));
            }
        }
        Ok(())
    }

    /// Whether the rule produces an instance on `date`.
    #[must_use]
    pub fn occurs_on(&self, starts_on: NaiveDate, date: NaiveDate) -> bool {
        if date < starts_on || self.interval == 0 {
            return false;
        }
        let interval = i64::from(self.interval);
        match self.kind {
            RecurrenceType::Daily | RecurrenceType::Custom => {
                (date - starts_on).num_days() % interval == 0
            }
            RecurrenceType::Weekly => {
                let weeks = (week_start(date) - week_start(starts_on)).num_days() / 7;
                weeks % interval == 0 && self.weekdays_or(starts_on).contains(&weekday(date))
            }
            RecurrenceType::Monthly => {
                let months = i64::from(date.year() - starts_on.year()) * 12
                    + i64::from(date.month())
                    - i64::from(starts_on.month());
                if months % interval != 0 {
                    return false;
                }
                match self.week_of_month {
                    Some(week) if !self.days_of_week.is_empty() => {
                        self.days_of_week.contains(&weekday(date))
                            && nth_weekday_matches(date, week)
                    }
                    _ => {
                        let wanted = self
                            .day_of_month
                            .map_or(starts_on.day(), u32::from)
                            .min(days_in_month(date.year(), date.month()));
                        date.day() == wanted
                    }
                }
            }
            RecurrenceType::Yearly => {
                let years = i64::from(date.year() - starts_on.year());
                years % interval == 0
                    && date.month() == starts_on.month()
                    && date.day() == starts_on.day().min(days_in_month(date.year(), date.month()))
            }
        }
    }

    /// First occurrence on or after `from`, never before `starts_on` and
    /// never after `ends_on`.
    #[must_use]
    pub fn next_on_or_after(
        &self,
        starts_on: NaiveDate,
        ends_on: Option<NaiveDate>,
        from: NaiveDate,
    ) -> Option<NaiveDate> {
        let start = from.max(starts_on);
        // One full period of the coarsest cadence plus slack for month-end clamping.
        let horizon = (usize::try_from(self.interval).ok()? + 1) * 366 + 31;
        start
            .iter_days()
            .take(horizon)
            .take_while(|d| ends_on.is_none_or(|end| *d <= end))
            .find(|d| self.occurs_on(starts_on, *d))
    }

    fn weekdays_or(&self, starts_on: NaiveDate) -> Vec<u8> {
        if self.days_of_week.is_empty() {
            vec![weekday(starts_on)]
        } else {
            self.days_of_week.clone()
        }
    }
}

fn weekday(date: NaiveDate) -> u8 {
    u8::try_from(date.weekday().num_days_from_sunday()).unwrap_or(0)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(weekday(date))))
        .unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

fn nth_weekday_matches(date: NaiveDate, week: u8) -> bool {
    if week == LAST_WEEK_OF_MONTH {
        date.day() + 7 > days_in_month(date.year(), date.month())
    } else {
        (date.day() - 1) / 7 + 1 == u32::from(week)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_every_other_day() {
        let rule = RecurrenceRule::every(RecurrenceType::Daily, 2);
        let start = d(2024, 3, 1);
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 3, 1)), Some(d(2024, 3, 1)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 3, 2)), Some(d(2024, 3, 3)));
    }

    #[test]
    fn never_before_start() {
        let rule = RecurrenceRule::every(RecurrenceType::Daily, 1);
        let start = d(2024, 5, 10);
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 1, 1)), Some(start));
    }

    #[test]
    fn never_after_end() {
        let rule = RecurrenceRule::every(RecurrenceType::Custom, 10);
        let start = d(2024, 1, 1);
        let end = Some(d(2024, 1, 15));
        assert_eq!(rule.next_on_or_after(start, end, d(2024, 1, 2)), Some(d(2024, 1, 11)));
        assert_eq!(rule.next_on_or_after(start, end, d(2024, 1, 12)), None);
    }

    #[test]
    fn weekly_on_selected_days() {
        // 2024-01-07 is a Sunday.
        let rule = RecurrenceRule {
            days_of_week: vec![1, 3],
            ..RecurrenceRule::every(RecurrenceType::Weekly, 1)
        };
        let start = d(2024, 1, 7);
        assert_eq!(rule.next_on_or_after(start, None, start), Some(d(2024, 1, 8)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 1, 9)), Some(d(2024, 1, 10)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 1, 11)), Some(d(2024, 1, 15)));
    }

    #[test]
    fn weekly_defaults_to_start_weekday_and_skips_weeks() {
        // Wednesday start, every second week.
        let rule = RecurrenceRule::every(RecurrenceType::Weekly, 2);
        let start = d(2024, 1, 3);
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 1, 4)), Some(d(2024, 1, 17)));
    }

    #[test]
    fn monthly_clamps_to_month_length() {
        let rule = RecurrenceRule {
            day_of_month: Some(31),
            ..RecurrenceRule::every(RecurrenceType::Monthly, 1)
        };
        let start = d(2024, 1, 31);
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 2, 1)), Some(d(2024, 2, 29)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 4, 1)), Some(d(2024, 4, 30)));
    }

    #[test]
    fn monthly_nth_weekday() {
        // Second Tuesday.
        let rule = RecurrenceRule {
            days_of_week: vec![2],
            week_of_month: Some(2),
            ..RecurrenceRule::every(RecurrenceType::Monthly, 1)
        };
        let start = d(2024, 1, 1);
        assert_eq!(rule.next_on_or_after(start, None, start), Some(d(2024, 1, 9)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 1, 10)), Some(d(2024, 2, 13)));
    }

    #[test]
    fn monthly_last_friday() {
        let rule = RecurrenceRule {
            days_of_week: vec![5],
            week_of_month: Some(LAST_WEEK_OF_MONTH),
            ..RecurrenceRule::every(RecurrenceType::Monthly, 1)
        };
        let start = d(2024, 2, 1);
        assert_eq!(rule.next_on_or_after(start, None, start), Some(d(2024, 2, 23)));
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 2, 24)), Some(d(2024, 3, 29)));
    }

    #[test]
    fn yearly_leap_day_falls_back_in_common_years() {
        let rule = RecurrenceRule::every(RecurrenceType::Yearly, 1);
        let start = d(2024, 2, 29);
        assert_eq!(rule.next_on_or_after(start, None, d(2024, 3, 1)), Some(d(2025, 2, 28)));
        assert_eq!(rule.next_on_or_after(start, None, d(2027, 3, 1)), Some(d(2028, 2, 29)));
    }

    #[test]
    fn validate_ranges() {
        assert!(RecurrenceRule::every(RecurrenceType::Daily, 0).validate().is_err());
        let bad_day = RecurrenceRule {
            days_of_week: vec![7],
            ..RecurrenceRule::every(RecurrenceType::Weekly, 1)
        };
        assert!(bad_day.validate().is_err());
        let bad_week = RecurrenceRule {
            week_of_month: Some(6),
            ..RecurrenceRule::every(RecurrenceType::Monthly, 1)
        };
        assert!(bad_week.validate().is_err());
        assert!(RecurrenceRule::every(RecurrenceType::Yearly, 3).validate().is_ok());
    }
}
