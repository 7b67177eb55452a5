//! Recurrence buckets.
//!
//! Every task belongs to exactly one [`Bucket`], derived from its recurrence
//! kind by [`Bucket::classify`]. Buckets are never stored; rank order is
//! scoped per bucket, so both the dashboard grouping and the reorder engine
//! go through the same function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cadence of a recurring template and of the instances generated from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    /// Every N days.
    Daily,
    /// Every N weeks on selected weekdays.
    Weekly,
    /// Every N months on a day or an n-th weekday.
    Monthly,
    /// Every N years on the start date's anniversary.
    Yearly,
    /// User-defined interval in days.
    Custom,
}

impl RecurrenceType {
    /// Storage representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for RecurrenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown recurrence type: {other}")),
        }
    }
}

/// Named task grouping. Declaration order is display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Instances of daily templates.
    Daily,
    /// Instances of weekly templates.
    Weekly,
    /// Instances of monthly templates.
    Monthly,
    /// Instances of yearly templates.
    Yearly,
    /// Instances of custom-interval templates.
    Custom,
    /// One-off tasks.
    Regular,
}

impl Bucket {
    /// All buckets in display order.
    pub const ALL: [Self; 6] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
        Self::Custom,
        Self::Regular,
    ];

    /// Map recurrence metadata to its bucket.
    ///
    /// The interval does not influence the bucket: a task repeating every
    /// three days is still `daily`.
    #[must_use]
    pub fn classify(recurrence: Option<RecurrenceType>) -> Self {
        match recurrence {
            None => Self::Regular,
            Some(RecurrenceType::Daily) => Self::Daily,
            Some(RecurrenceType::Weekly) => Self::Weekly,
            Some(RecurrenceType::Monthly) => Self::Monthly,
            Some(RecurrenceType::Yearly) => Self::Yearly,
            Some(RecurrenceType::Custom) => Self::Custom,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
