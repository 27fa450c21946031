//! leaderlock Core - TTL-lease leader lock
//!
//! This crate provides:
//! - `Identity`: the token a locker claims the lock with
//! - `new_key_value`: idempotent bucket provisioning
//! - `Locker`: acquire/release/renew protocol over a `KeyValueStore`

pub mod identity;
pub mod locker;
pub mod provision;

pub use identity::Identity;
pub use locker::{Locker, LockerConfig};
pub use provision::new_key_value;

pub use leaderlock_common::{DEFAULT_KEY_NAME, LeaderLockError, Result};
