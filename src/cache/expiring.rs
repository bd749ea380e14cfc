//! Thread-safe key/value store with per-entry time-to-live.
//!
//! Expired entries are never returned. They stay in the map until a write to
//! the same key replaces them or [`ExpiringStore::purge_expired`] sweeps them.
//! There is no size bound: growth is limited only by TTLs and the sweep
//! cadence, so adversarial key churn can grow the map until the next sweep.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::clock::{Clock, SystemClock};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::expiring";

/// Longest lifetime an entry can actually get; larger TTLs are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Slot<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct ExpiringStore<K, V> {
    entries: RwLock<HashMap<K, Slot<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Insert or overwrite `key`, expiring `ttl` from now (at most [`MAX_TTL`]).
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = expiry(self.clock.now(), ttl);
        rw_write(&self.entries, SOURCE, "set").insert(key, Slot { value, expires_at });
    }

    pub fn delete(&self, key: &K) {
        rw_write(&self.entries, SOURCE, "delete").remove(key);
    }

    /// Time left before the live entry for `key` expires.
    pub fn remaining_ttl(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "remaining_ttl")
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Atomically read-modify-write the live entry for `key`.
    ///
    /// A missing or expired entry is first replaced by `init()` expiring `ttl`
    /// from now. An existing live entry keeps its original expiry.
    pub fn update<R>(
        &self,
        key: K,
        ttl: Duration,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "update");
        let entry = match entries.entry(key) {
            MapEntry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                if !slot.is_live(now) {
                    *slot = Slot {
                        value: init(),
                        expires_at: expiry(now, ttl),
                    };
                }
                slot
            }
            MapEntry::Vacant(vacant) => vacant.insert(Slot {
                value: init(),
                expires_at: expiry(now, ttl),
            }),
        };
        f(&mut entry.value)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "len")
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the value for `key` unless it is absent or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "get")
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }
}

impl<K, V> Default for ExpiringStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::cache::clock::ManualClock;

    fn store() -> (ExpiringStore<String, u32>, ManualClock) {
        let clock = ManualClock::new();
        (ExpiringStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn set_then_get_returns_value() {
        let (store, _) = store();
        store.set("k".into(), 7, Duration::from_secs(10));
        assert_eq!(store.get(&"k".to_string()), Some(7));
    }

    #[test]
    fn entry_is_gone_once_ttl_elapses() {
        let (store, clock) = store();
        store.set("k".into(), 7, Duration::from_secs(10));

        clock.advance(Duration::from_millis(9_999));
        assert_eq!(store.get(&"k".to_string()), Some(7));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get(&"k".to_string()), None);
    }

    #[test]
    fn overwrite_replaces_value_and_expiry() {
        let (store, clock) = store();
        store.set("k".into(), 1, Duration::from_secs(1));
        store.set("k".into(), 2, Duration::from_secs(10));

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.get(&"k".to_string()), Some(2));
    }

    #[test]
    fn delete_is_a_noop_for_missing_keys() {
        let (store, _) = store();
        store.delete(&"missing".to_string());

        store.set("k".into(), 1, Duration::from_secs(1));
        store.delete(&"k".to_string());
        assert!(store.get(&"k".to_string()).is_none());
    }

    #[test]
    fn update_keeps_expiry_of_live_entry() {
        let (store, clock) = store();
        let ttl = Duration::from_secs(60);

        store.update("c".into(), ttl, || 0, |v| *v += 1);
        clock.advance(Duration::from_secs(59));
        store.update("c".into(), ttl, || 0, |v| *v += 1);
        assert_eq!(store.get(&"c".to_string()), Some(2));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get(&"c".to_string()), None);

        let after_reset = store.update("c".into(), ttl, || 0, |v| {
            *v += 1;
            *v
        });
        assert_eq!(after_reset, 1);
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (store, clock) = store();
        store.set("short".into(), 1, Duration::from_secs(1));
        store.set("long".into(), 2, Duration::from_secs(100));

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn len_ignores_expired_entries_before_sweep() {
        let (store, clock) = store();
        store.set("a".into(), 1, Duration::from_secs(1));
        store.set("b".into(), 1, Duration::from_secs(3));
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn remaining_ttl_counts_down() {
        let (store, clock) = store();
        store.set("k".into(), 1, Duration::from_secs(30));
        clock.advance(Duration::from_secs(10));
        assert_eq!(
            store.remaining_ttl(&"k".to_string()),
            Some(Duration::from_secs(20))
        );
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let (store, _) = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set("k".into(), 3, Duration::from_secs(1));
        assert_eq!(store.get(&"k".to_string()), Some(3));
    }

    #[test]
    fn oversized_ttl_is_clamped_instead_of_overflowing() {
        let (store, _) = store();
        store.set("k".into(), 1, Duration::MAX);
        store.update("c".into(), Duration::MAX, || 0, |v| *v += 1);

        assert_eq!(store.get(&"k".to_string()), Some(1));
        assert_eq!(store.get(&"c".to_string()), Some(1));
        assert_eq!(store.remaining_ttl(&"k".to_string()), Some(MAX_TTL));
    }
}
