//! Periodic removal of expired entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::debug;

use super::admission::AdmissionController;
use super::expiring::ExpiringStore;
use super::response::ResponseCache;

/// Anything holding entries that can expire.
pub trait Sweep: Send + Sync + 'static {
    fn purge_expired(&self) -> usize;
}

impl<K, V> Sweep for ExpiringStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn purge_expired(&self) -> usize {
        ExpiringStore::purge_expired(self)
    }
}

impl Sweep for ResponseCache {
    fn purge_expired(&self) -> usize {
        ResponseCache::purge_expired(self)
    }
}

impl Sweep for AdmissionController {
    fn purge_expired(&self) -> usize {
        AdmissionController::purge_expired(self)
    }
}

/// Run `target.purge_expired()` every `interval` until the handle is aborted.
///
/// The first sweep happens one full interval after spawning.
pub fn spawn_sweeper<S: Sweep>(
    name: &'static str,
    target: Arc<S>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = target.purge_expired();
            counter!("bookstore_store_swept_total", "store" => name).increment(removed as u64);
            debug!(
                target = "bookstore::cache::sweeper",
                store = name,
                removed,
                "Swept expired entries"
            );
        }
    })
}
