use log::{debug, warn};
use rusqlite::Connection;
use std::thread;
use std::time::Duration;

use super::conflict::first_conflict;
use super::entitlement::is_entitled;
use super::error::SchedulingError;
use super::model::{DayKey, Slot, TeacherAssignment, TimetableDay, Weekday};
use super::store::TimetableStore;
use crate::db;

pub const SETTINGS_KEY: &str = "setup.timetable";

/// Retry limits for store access. Writes retry on a stale version or a busy
/// database; every retry re-validates against the freshly read day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub max_write_attempts: u32,
    pub read_retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            max_write_attempts: 3,
            read_retry_attempts: 3,
            retry_backoff: Duration::from_millis(20),
        }
    }
}

impl WritePolicy {
    /// Reads the `timetable` setup section. Missing or out-of-range values
    /// fall back to defaults.
    pub fn from_settings(conn: &Connection) -> Self {
        let defaults = Self::default();
        let obj = db::settings_get_json(conn, SETTINGS_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        let max_write_attempts = obj
            .get("maxWriteAttempts")
            .and_then(|v| v.as_u64())
            .filter(|v| (1..=10).contains(v))
            .map(|v| v as u32)
            .unwrap_or(defaults.max_write_attempts);
        let read_retry_attempts = obj
            .get("readRetryAttempts")
            .and_then(|v| v.as_u64())
            .filter(|v| (1..=10).contains(v))
            .map(|v| v as u32)
            .unwrap_or(defaults.read_retry_attempts);
        let retry_backoff = obj
            .get("retryBackoffMs")
            .and_then(|v| v.as_u64())
            .filter(|v| *v <= 5000)
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);
        Self {
            max_write_attempts,
            read_retry_attempts,
            retry_backoff,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}

/// Result of [`SlotEditor::remove_slot`]: the day as stored afterwards and the
/// slot taken out, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub day: TimetableDay,
    pub removed: Option<Slot>,
}

/// Add/remove orchestration over a [`TimetableStore`].
pub struct SlotEditor<'a> {
    store: TimetableStore<'a>,
    policy: WritePolicy,
}

impl<'a> SlotEditor<'a> {
    pub fn new(store: TimetableStore<'a>, policy: WritePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &TimetableStore<'a> {
        &self.store
    }

    /// Reads `key`, retrying while SQLite reports the database busy.
    pub fn read_day(&self, key: &DayKey) -> Result<TimetableDay, SchedulingError> {
        let mut attempt = 1;
        loop {
            match self.store.get(key) {
                Err(e) if e.is_transient() && attempt < self.policy.read_retry_attempts => {
                    warn!("read of {} hit a busy database (attempt {}): {}", key, attempt, e);
                    thread::sleep(self.policy.backoff(attempt));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Appends `candidate` to the day after checking entitlement, range and
    /// overlap. Rejections never touch the store.
    pub fn add_slot(
        &self,
        class_id: &str,
        weekday: Weekday,
        candidate: Slot,
        acting_teacher_id: &str,
        assignments: &[TeacherAssignment],
    ) -> Result<TimetableDay, SchedulingError> {
        let key = DayKey::new(class_id, weekday);

        if candidate.teacher_id != acting_teacher_id
            || !is_entitled(acting_teacher_id, class_id, &candidate.subject_id, assignments)
        {
            warn!(
                "rejected slot for {}: {} lacks {} entitlement",
                key, acting_teacher_id, candidate.subject_id
            );
            return Err(SchedulingError::NotEntitled {
                teacher_id: acting_teacher_id.to_string(),
                class_id: class_id.to_string(),
                subject_id: candidate.subject_id,
            });
        }
        if !candidate.has_valid_range() {
            warn!("rejected slot for {}: empty or inverted range {}", key, candidate);
            return Err(SchedulingError::InvalidRange {
                start: candidate.start_time,
                end: candidate.end_time,
            });
        }

        let mut attempt = 1;
        loop {
            let current = self.read_day(&key)?;
            if let Some(existing) = first_conflict(&candidate, &current.slots) {
                warn!("rejected slot for {}: {} overlaps {}", key, candidate, existing);
                return Err(SchedulingError::SlotConflict {
                    existing: existing.clone(),
                    candidate,
                });
            }

            let mut next = current.slots;
            next.push(candidate.clone());
            match self.store.replace_all(&key, current.version, next) {
                Ok(day) => {
                    debug!("added {} to {} (version {})", candidate, key, day.version);
                    return Ok(day);
                }
                Err(SchedulingError::StaleVersion { found, .. })
                    if attempt < self.policy.max_write_attempts =>
                {
                    warn!(
                        "{} moved from version {} to {} during add, retrying (attempt {})",
                        key, current.version, found, attempt
                    );
                    thread::sleep(self.policy.backoff(attempt));
                    attempt += 1;
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_write_attempts => {
                    warn!("add to {} hit a busy database (attempt {}): {}", key, attempt, e);
                    thread::sleep(self.policy.backoff(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Removes the slot at `index`. An index past the end is a no-op and the
    /// outcome carries no removed slot.
    ///
    /// With `expected_version` the index is taken to refer to that version of
    /// the day, and a newer stored day fails with `StaleVersion` rather than
    /// removing whatever now sits at `index`.
    pub fn remove_slot(
        &self,
        class_id: &str,
        weekday: Weekday,
        index: usize,
        expected_version: Option<i64>,
    ) -> Result<Removal, SchedulingError> {
        let key = DayKey::new(class_id, weekday);
        let mut attempt = 1;
        loop {
            let current = self.read_day(&key)?;
            if let Some(expected) = expected_version {
                if expected != current.version {
                    return Err(SchedulingError::StaleVersion {
                        key,
                        expected,
                        found: current.version,
                    });
                }
            }
            if index >= current.slots.len() {
                debug!(
                    "remove of index {} on {} ignored ({} slot(s))",
                    index,
                    key,
                    current.slots.len()
                );
                return Ok(Removal {
                    day: current,
                    removed: None,
                });
            }

            let mut next = current.slots;
            let removed = next.remove(index);
            match self.store.replace_all(&key, current.version, next) {
                Ok(day) => {
                    debug!("removed {} from {} (version {})", removed, key, day.version);
                    return Ok(Removal {
                        day,
                        removed: Some(removed),
                    });
                }
                Err(SchedulingError::StaleVersion { found, .. })
                    if expected_version.is_none() && attempt < self.policy.max_write_attempts =>
                {
                    warn!(
                        "{} moved from version {} to {} during remove, retrying (attempt {})",
                        key, current.version, found, attempt
                    );
                    thread::sleep(self.policy.backoff(attempt));
                    attempt += 1;
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_write_attempts => {
                    warn!("remove on {} hit a busy database (attempt {}): {}", key, attempt, e);
                    thread::sleep(self.policy.backoff(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
