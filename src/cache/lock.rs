//! Lock acquisition for the in-process stores.
//!
//! A panic while a store lock is held poisons it. The stores hold only
//! counters, tokens and cached reads, and every mutation leaves them in a
//! valid state, so the guard is taken back and the event is logged and
//! counted instead of failing every later request.

use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tracing::warn;

fn recovered<G>(
    result: LockResult<G>,
    store: &'static str,
    op: &'static str,
    mode: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(store, op, mode, "store lock poisoned by a panicking holder, continuing");
        counter!("bookstore_lock_poisoned_total", "store" => store).increment(1);
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recovered(lock.read(), store, op, "read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recovered(lock.write(), store, op, "write")
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    store: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recovered(lock.lock(), store, op, "exclusive")
}
