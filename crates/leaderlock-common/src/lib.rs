//! leaderlock Common - Shared error types and constants
//!
//! This crate provides the foundational types used across all leaderlock components:
//! - Error type and result alias
//! - Default names for the lock key and bucket

pub mod error;

// Re-exports for convenience
pub use error::{LeaderLockError, Result};

/// Key name used for the lock entry when none is configured
pub const DEFAULT_KEY_NAME: &str = "leader";

/// Bucket name used by the worker when none is configured
pub const DEFAULT_BUCKET_NAME: &str = "leaderlock";

/// Event action names carried on the event bus
pub const EVENT_CREATE: &str = "CREATE";
pub const EVENT_UPDATE: &str = "UPDATE";
pub const EVENT_DELETE: &str = "DELETE";
