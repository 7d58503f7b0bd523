use log::debug;
use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, Weak};

use super::model::{DayKey, TimetableDay};

/// A persisted day changed. Carries the value as written, so subscribers do
/// not need to read it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayChange {
    pub key: DayKey,
    pub day: TimetableDay,
}

#[derive(Default)]
struct FeedInner {
    next_id: u64,
    subscribers: HashMap<DayKey, Vec<(u64, mpsc::Sender<DayChange>)>>,
}

/// In-process push feed keyed by timetable day.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedInner>>,
}

fn lock(inner: &Mutex<FeedInner>) -> MutexGuard<'_, FeedInner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one receiver for every key in `keys`. Dropping the returned
    /// handle unsubscribes from all of them.
    pub fn subscribe(&self, keys: &[DayKey]) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        for key in keys {
            inner
                .subscribers
                .entry(key.clone())
                .or_default()
                .push((id, tx.clone()));
        }
        debug!("feed subscription {} opened for {} key(s)", id, keys.len());
        Subscription {
            id,
            keys: keys.to_vec(),
            rx,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `change` to every live subscriber of its key. Returns the
    /// number of receivers reached.
    pub fn publish(&self, change: &DayChange) -> usize {
        let mut inner = lock(&self.inner);
        let Some(subs) = inner.subscribers.get_mut(&change.key) else {
            return 0;
        };
        // A send only fails once the receiver is gone; prune those.
        subs.retain(|(_, tx)| tx.send(change.clone()).is_ok());
        let reached = subs.len();
        if subs.is_empty() {
            inner.subscribers.remove(&change.key);
        }
        reached
    }

    pub fn subscriber_count(&self, key: &DayKey) -> usize {
        lock(&self.inner)
            .subscribers
            .get(key)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Scoped subscription handle.
pub struct Subscription {
    id: u64,
    keys: Vec<DayKey>,
    rx: mpsc::Receiver<DayChange>,
    feed: Weak<Mutex<FeedInner>>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<DayChange> {
        self.rx.try_recv().ok()
    }

    /// Everything delivered since the last drain, in publish order.
    pub fn drain(&self) -> Vec<DayChange> {
        self.rx.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(feed) = self.feed.upgrade() else {
            return;
        };
        let mut inner = lock(&feed);
        for key in &self.keys {
            if let Some(subs) = inner.subscribers.get_mut(key) {
                subs.retain(|(id, _)| *id != self.id);
                if subs.is_empty() {
                    inner.subscribers.remove(key);
                }
            }
        }
        debug!("feed subscription {} released", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::model::Weekday;

    fn change(class_id: &str, weekday: Weekday, version: i64) -> DayChange {
        DayChange {
            key: DayKey::new(class_id, weekday),
            day: TimetableDay {
                slots: Vec::new(),
                version,
            },
        }
    }

    #[test]
    fn subscriber_only_sees_its_keys() {
        let feed = ChangeFeed::new();
        let sub = feed.subscribe(&[DayKey::new("JSS 1", Weekday::Monday)]);

        assert_eq!(feed.publish(&change("JSS 1", Weekday::Monday, 1)), 1);
        assert_eq!(feed.publish(&change("JSS 1", Weekday::Tuesday, 1)), 0);
        assert_eq!(feed.publish(&change("JSS 2", Weekday::Monday, 1)), 0);

        let got = sub.drain();
        assert_eq!(got, vec![change("JSS 1", Weekday::Monday, 1)]);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn dropping_the_handle_unsubscribes_every_key() {
        let feed = ChangeFeed::new();
        let keys = DayKey::week_of("JSS 1");
        let sub = feed.subscribe(&keys);
        assert_eq!(feed.subscriber_count(&keys[0]), 1);
        assert_eq!(feed.subscriber_count(&keys[4]), 1);

        drop(sub);

        for key in &keys {
            assert_eq!(feed.subscriber_count(key), 0);
        }
        assert_eq!(feed.publish(&change("JSS 1", Weekday::Friday, 3)), 0);
    }

    #[test]
    fn release_on_early_return_path() {
        fn watch_and_bail(feed: &ChangeFeed) -> Result<(), &'static str> {
            let _sub = feed.subscribe(&[DayKey::new("JSS 1", Weekday::Monday)]);
            Err("view failed to mount")
        }

        let feed = ChangeFeed::new();
        assert!(watch_and_bail(&feed).is_err());
        assert_eq!(
            feed.subscriber_count(&DayKey::new("JSS 1", Weekday::Monday)),
            0
        );
    }

    #[test]
    fn handle_outliving_feed_drops_cleanly() {
        let feed = ChangeFeed::new();
        let sub = feed.subscribe(&[DayKey::new("JSS 1", Weekday::Monday)]);
        drop(feed);
        assert!(sub.try_next().is_none());
        drop(sub);
    }
}
