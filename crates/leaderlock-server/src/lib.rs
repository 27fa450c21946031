//! leaderlock Server - worker process wiring
//!
//! Loads configuration, initializes logging and metrics, opens the
//! key-value backend and runs a leader-gated reconcile loop until the
//! process is asked to stop.

pub mod client;
pub mod config;
pub mod metrics;
pub mod startup;

pub use client::LoggingReconcileClient;
pub use self::config::{Cli, Configuration, StoreBackend};
