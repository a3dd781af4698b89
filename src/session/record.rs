use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a task recurs. Recorded with every entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum Cadence {
    Daily,
    Weekly,
    Periodic,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Daily, Cadence::Weekly, Cadence::Periodic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "Daily",
            Cadence::Weekly => "Weekly",
            Cadence::Periodic => "Periodic",
        }
    }
}

impl Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown cadence {0:?}, expected one of Daily, Weekly, Periodic")]
pub struct UnknownCadence(pub String);

impl FromStr for Cadence {
    type Err = UnknownCadence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cadence::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCadence(s.to_string()))
    }
}

/// Snapshot of a finished session. Produced once by
/// [TimerSession::end](super::timer::TimerSession::end) and written once by a
/// [RecordWriter](crate::storage::record_writer::RecordWriter).
///
/// Field order matches the column order on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub(crate) task: String,
    pub(crate) cadence: Cadence,
    pub(crate) account: Option<String>,
    pub(crate) user: String,
    pub(crate) start_utc: DateTime<Utc>,
    pub(crate) end_utc: DateTime<Utc>,
    pub(crate) duration_seconds: i64,
    pub(crate) notes: Option<String>,
    pub(crate) app_version: String,
    pub(crate) record_id: Uuid,
    pub(crate) covering_for: Option<String>,
    pub(crate) partially_complete: bool,
}

impl TaskRecord {
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start_utc
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end_utc
    }

    pub fn duration_seconds(&self) -> i64 {
        self.duration_seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn covering_for(&self) -> Option<&str> {
        self.covering_for.as_deref()
    }

    pub fn is_covering(&self) -> bool {
        self.covering_for.is_some()
    }

    pub fn partially_complete(&self) -> bool {
        self.partially_complete
    }

    /// UTC day the record is partitioned under.
    pub fn partition_date(&self) -> NaiveDate {
        self.start_utc.date_naive()
    }

    /// Returns a copy with a corrected duration. Used when the operator reviews the measured time
    /// before submitting. Negative values become 0.
    pub fn with_duration_seconds(self, duration_seconds: i64) -> Self {
        Self {
            duration_seconds: duration_seconds.max(0),
            ..self
        }
    }
}

/// Trims the value and maps blank strings to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
