use chrono::Utc;
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::error::SchedulingError;
use super::feed::{ChangeFeed, DayChange};
use super::model::{DayKey, Slot, TimetableDay};

/// Stored document body for one (class, weekday) row.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DayDocument {
    slots: Vec<Slot>,
}

/// Versioned whole-list persistence for timetable days. Every successful
/// replace is pushed to the change feed.
pub struct TimetableStore<'a> {
    conn: &'a Connection,
    feed: &'a ChangeFeed,
}

impl<'a> TimetableStore<'a> {
    pub fn new(conn: &'a Connection, feed: &'a ChangeFeed) -> Self {
        Self { conn, feed }
    }

    /// Current slots of `key`; a day that was never written is empty at
    /// version 0.
    pub fn get(&self, key: &DayKey) -> Result<TimetableDay, SchedulingError> {
        read_day(self.conn, key)
    }

    /// Overwrites the whole slot list of `key`, provided the stored version is
    /// still `expected_version`. On success the version advances by one and
    /// subscribers receive the new day.
    ///
    /// The transaction takes the write lock up front, so two writers never
    /// both read the same version and then race to upgrade.
    pub fn replace_all(
        &self,
        key: &DayKey,
        expected_version: i64,
        slots: Vec<Slot>,
    ) -> Result<TimetableDay, SchedulingError> {
        let raw = serde_json::to_string(&DayDocument { slots })?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(SchedulingError::Write)?;
        let found: i64 = tx
            .query_row(
                "SELECT version FROM timetable_days WHERE class_id = ? AND weekday = ?",
                params![key.class_id, key.weekday.as_str()],
                |r| r.get(0),
            )
            .optional()
            .map_err(SchedulingError::Write)?
            .unwrap_or(0);
        if found != expected_version {
            // Dropping the transaction rolls it back.
            return Err(SchedulingError::StaleVersion {
                key: key.clone(),
                expected: expected_version,
                found,
            });
        }

        let next_version = found + 1;
        let updated_at = Utc::now().to_rfc3339();
        if let Err(e) = tx.execute(
            "INSERT INTO timetable_days(class_id, weekday, slots_json, version, updated_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(class_id, weekday) DO UPDATE SET
               slots_json = excluded.slots_json,
               version = excluded.version,
               updated_at = excluded.updated_at",
            params![
                key.class_id,
                key.weekday.as_str(),
                raw,
                next_version,
                updated_at
            ],
        ) {
            error!("timetable write failed for {}: {}", key, e);
            return Err(SchedulingError::Write(e));
        }
        tx.commit().map_err(SchedulingError::Write)?;

        let day = read_day(self.conn, key)?;
        let reached = self.feed.publish(&DayChange {
            key: key.clone(),
            day: day.clone(),
        });
        debug!(
            "timetable {} now at version {} ({} slot(s), {} subscriber(s) notified)",
            key,
            day.version,
            day.slots.len(),
            reached
        );
        Ok(day)
    }
}

fn read_day(conn: &Connection, key: &DayKey) -> Result<TimetableDay, SchedulingError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT slots_json, version FROM timetable_days WHERE class_id = ? AND weekday = ?",
            params![key.class_id, key.weekday.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((raw, version)) = row else {
        return Ok(TimetableDay::default());
    };
    let doc: DayDocument = serde_json::from_str(&raw)?;
    Ok(TimetableDay {
        slots: doc.slots,
        version,
    })
}
