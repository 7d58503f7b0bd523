use thiserror::Error;

use super::model::{ClockTime, DayKey, Slot};

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("teacher {teacher_id} is not assigned to teach {subject_id} in {class_id}")]
    NotEntitled {
        teacher_id: String,
        class_id: String,
        subject_id: String,
    },
    #[error("slot {candidate} overlaps existing slot {existing}")]
    SlotConflict { candidate: Slot, existing: Slot },
    #[error("slot start {start} must be before end {end}")]
    InvalidRange { start: ClockTime, end: ClockTime },
    #[error("timetable {key} changed concurrently (expected version {expected}, found {found})")]
    StaleVersion {
        key: DayKey,
        expected: i64,
        found: i64,
    },
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),
    #[error("timetable write failed: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("stored timetable is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl SchedulingError {
    /// Stable code reported to IPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotEntitled { .. } => "not_entitled",
            Self::SlotConflict { .. } => "slot_conflict",
            Self::InvalidRange { .. } => "invalid_range",
            Self::StaleVersion { .. } => "stale_version",
            Self::Persistence(_) => "db_query_failed",
            Self::Write(_) => "db_update_failed",
            Self::Corrupt(_) => "db_corrupt",
        }
    }

    /// Validation outcomes the user can act on; the store is untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotEntitled { .. } | Self::SlotConflict { .. } | Self::InvalidRange { .. }
        )
    }

    /// SQLite busy/locked. Safe to retry: writes are guarded by the version
    /// check, so a retried write re-validates against the latest day.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Persistence(rusqlite::Error::SqliteFailure(e, _))
            | Self::Write(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
