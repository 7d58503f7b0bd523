use std::collections::BTreeMap;

use super::error::SchedulingError;
use super::feed::{ChangeFeed, Subscription};
use super::model::{DayKey, Slot, Weekday};
use super::store::TimetableStore;

/// Monday..Friday, each day's slots in stored order.
pub type WeeklyGrid = BTreeMap<Weekday, Vec<Slot>>;

pub fn filter_subject(slots: &[Slot], subject_id: &str) -> Vec<Slot> {
    slots
        .iter()
        .filter(|s| s.subject_id == subject_id)
        .cloned()
        .collect()
}

pub fn class_grid(store: &TimetableStore<'_>, class_id: &str) -> Result<WeeklyGrid, SchedulingError> {
    let mut grid = WeeklyGrid::new();
    for weekday in Weekday::ALL {
        let day = store.get(&DayKey::new(class_id, weekday))?;
        grid.insert(weekday, day.slots);
    }
    Ok(grid)
}

pub fn subject_grid(
    store: &TimetableStore<'_>,
    class_id: &str,
    subject_id: &str,
) -> Result<WeeklyGrid, SchedulingError> {
    let mut grid = WeeklyGrid::new();
    for weekday in Weekday::ALL {
        let day = store.get(&DayKey::new(class_id, weekday))?;
        grid.insert(weekday, filter_subject(&day.slots, subject_id));
    }
    Ok(grid)
}

/// One day of a live grid that changed since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridUpdate {
    pub weekday: Weekday,
    pub version: i64,
    pub slots: Vec<Slot>,
}

/// A weekly grid kept current from the change feed.
///
/// Each notification replaces only its own day, straight from the pushed
/// value. Dropping the grid releases its subscription.
pub struct LiveGrid {
    class_id: String,
    subject_id: Option<String>,
    grid: WeeklyGrid,
    versions: BTreeMap<Weekday, i64>,
    subscription: Subscription,
}

impl LiveGrid {
    pub fn open(
        store: &TimetableStore<'_>,
        feed: &ChangeFeed,
        class_id: &str,
        subject_id: Option<&str>,
    ) -> Result<Self, SchedulingError> {
        // Subscribe before the initial read so no write can slip between them.
        let subscription = feed.subscribe(&DayKey::week_of(class_id));
        let mut grid = WeeklyGrid::new();
        let mut versions = BTreeMap::new();
        for weekday in Weekday::ALL {
            let day = store.get(&DayKey::new(class_id, weekday))?;
            let slots = match subject_id {
                Some(s) => filter_subject(&day.slots, s),
                None => day.slots,
            };
            grid.insert(weekday, slots);
            versions.insert(weekday, day.version);
        }
        Ok(Self {
            class_id: class_id.to_string(),
            subject_id: subject_id.map(str::to_string),
            grid,
            versions,
            subscription,
        })
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    pub fn grid(&self) -> &WeeklyGrid {
        &self.grid
    }

    pub fn versions(&self) -> &BTreeMap<Weekday, i64> {
        &self.versions
    }

    /// Applies pending notifications and returns the days that changed,
    /// Monday first, one entry per day at its newest version.
    pub fn poll(&mut self) -> Vec<GridUpdate> {
        let mut latest: BTreeMap<Weekday, (i64, Vec<Slot>)> = BTreeMap::new();
        for change in self.subscription.drain() {
            let weekday = change.key.weekday;
            let known = latest
                .get(&weekday)
                .map(|(v, _)| *v)
                .unwrap_or_else(|| self.versions.get(&weekday).copied().unwrap_or(0));
            if change.day.version <= known {
                continue;
            }
            latest.insert(weekday, (change.day.version, change.day.slots));
        }

        let mut updates = Vec::with_capacity(latest.len());
        for (weekday, (version, slots)) in latest {
            let slots = match &self.subject_id {
                Some(s) => filter_subject(&slots, s),
                None => slots,
            };
            self.versions.insert(weekday, version);
            self.grid.insert(weekday, slots.clone());
            updates.push(GridUpdate {
                weekday,
                version,
                slots,
            });
        }
        updates
    }
}
