//! leaderlock Store - TTL key-value store contract
//!
//! This crate provides:
//! - `KeyValueStore` / `KeyValueManager` traits that lock backends implement
//! - An in-memory TTL implementation for single-process deployments and tests
//! - A NATS JetStream key-value backend for fleets (feature `nats`)
//! - A fault-injecting wrapper (feature `testing`)

pub mod kv;
pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use kv::{BucketConfig, BucketStatus, KeyValueEntry, KeyValueManager, KeyValueStore};
pub use memory::{MemoryKeyValueManager, MemoryKeyValueStore};
#[cfg(feature = "nats")]
pub use nats::{NatsKeyValueManager, NatsKeyValueStore};
