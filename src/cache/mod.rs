//! Ephemeral process-local state.
//!
//! Everything here lives in memory and disappears on restart:
//!
//! - [`ExpiringStore`]: key/value map with per-entry TTL
//! - [`ResponseCache`]: memoized read payloads keyed by [`CacheKey`]
//! - [`AdmissionController`]: per-client request admission
//! - [`TokenRegistry`]: issued session tokens
//!
//! None of these types log or emit metrics on their own, apart from the
//! warning raised when a poisoned lock is recovered.

mod admission;
mod clock;
mod expiring;
mod lock;
mod response;
mod sweeper;
mod tokens;

pub use admission::{AdmissionController, AdmissionError, AdmissionPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use expiring::ExpiringStore;
pub use response::{CacheKey, ResponseCache};
pub use sweeper::{Sweep, spawn_sweeper};
pub use tokens::{Credential, SessionToken, TokenError, TokenRegistry};
