//! Memoized read responses keyed by a request fingerprint.
//!
//! The cache is advisory: a miss means the caller re-reads the record store
//! and stores the fresh payload. Writes to the record store do not purge
//! anything here, so a cached payload may be stale for up to its TTL.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::clock::{Clock, SystemClock};
use super::expiring::ExpiringStore;

/// Deterministic fingerprint of a cacheable read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a book listing or search.
    ///
    /// Filters are concatenated without separators, so distinct filter sets
    /// such as `("ab", "", "")` and `("a", "b", "")` share a key.
    pub fn book_search(title: &str, genre: &str, author: &str) -> Self {
        Self(format!("books:{title}{genre}{author}"))
    }

    pub fn book(id: i64) -> Self {
        Self(format!("book:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct ResponseCache {
    store: ExpiringStore<CacheKey, Bytes>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: ExpiringStore::with_clock(clock),
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        self.store.get(key)
    }

    pub fn store(&self, key: CacheKey, payload: Bytes, ttl: Duration) {
        self.store.set(key, payload, ttl);
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    #[test]
    fn search_keys_follow_route_and_filters() {
        assert_eq!(
            CacheKey::book_search("Dune", "scifi", "Frank").as_str(),
            "books:DunescifiFrank"
        );
        assert_eq!(CacheKey::book_search("", "", "").as_str(), "books:");
        assert_eq!(CacheKey::book(12).as_str(), "book:12");
    }

    #[test]
    fn equivalent_requests_share_a_key() {
        assert_eq!(
            CacheKey::book_search("a", "b", "c"),
            CacheKey::book_search("a", "b", "c")
        );
        assert_ne!(CacheKey::book(1), CacheKey::book(10));
    }

    #[test]
    fn concatenation_ambiguity_is_preserved() {
        assert_eq!(
            CacheKey::book_search("ab", "", ""),
            CacheKey::book_search("a", "b", "")
        );
    }

    #[test]
    fn stored_payload_stays_until_ttl() {
        let clock = ManualClock::new();
        let cache = ResponseCache::with_clock(Arc::new(clock.clone()));
        let key = CacheKey::book(1);

        cache.store(key.clone(), Bytes::from_static(b"{\"id\":1}"), Duration::from_secs(600));
        clock.advance(Duration::from_secs(599));
        assert_eq!(cache.lookup(&key), Some(Bytes::from_static(b"{\"id\":1}")));

        clock.advance(Duration::from_secs(1));
        assert!(cache.lookup(&key).is_none());
    }
}
