//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file may name only the fields it changes.

use std::ops::RangeInclusive;

use quill_core::DEFAULT_MAX_KEY_LENGTH;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Allowed range for [`RankingSettings::max_key_length`].
pub const MAX_KEY_LENGTH_RANGE: RangeInclusive<usize> = 4..=64;

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/quill/tasks.db" },
///   "ranking": { "maxKeyLength": 32 },
///   "logging": { "level": "debug", "json": true }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuillSettings {
    /// Storage location and connection tuning.
    pub database: DatabaseSettings,
    /// Rank key allocation.
    pub ranking: RankingSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl QuillSettings {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let len = self.ranking.max_key_length;
        if !MAX_KEY_LENGTH_RANGE.contains(&len) {
            return Err(SettingsError::InvalidValue(format!(
                "ranking.maxKeyLength must be in {}..={}, got {len}",
                MAX_KEY_LENGTH_RANGE.start(),
                MAX_KEY_LENGTH_RANGE.end()
            )));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "database.busyTimeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// `SQLite` file path. `~` expands to `$HOME`.
    pub path: String,
    /// How long a writer waits for the lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "~/.quill/quill.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Rank key settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingSettings {
    /// Longest key the allocator hands out before rebalancing a bucket.
    pub max_key_length: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
