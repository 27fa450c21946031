//! leaderlock Reconciler - leader-gated reconciliation
//!
//! This crate provides:
//! - `ReconcileClient`: create/update/delete contract for a downstream system
//! - `Summary`: bookkeeping of items touched by a reconcile action
//! - `Reconciler`: periodic loop that reconciles only while holding the leader lock

pub mod client;
pub mod reconciler;
pub mod summary;

pub use client::{EventAction, EventMessage, ReconcileClient};
pub use reconciler::{DEFAULT_RECONCILE_INTERVAL, Reconciler, ReconcilerConfig, TickOutcome};
pub use summary::Summary;
