//! TTL key-value store contract
//!
//! Entries live in named buckets. Every bucket carries one TTL that applies
//! to all of its keys; an entry not rewritten within the TTL window is
//! reported as absent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use leaderlock_common::Result;

/// A single value read from a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueEntry {
    /// Bucket the entry belongs to
    pub bucket: String,
    /// Entry key
    pub key: String,
    /// Raw stored value
    pub value: Bytes,
    /// Bucket-wide revision assigned by the last write
    pub revision: u64,
    /// Wall-clock time of the last write
    pub created: DateTime<Utc>,
}

impl KeyValueEntry {
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// Bucket creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    /// Bucket name
    pub bucket: String,
    /// Entry time-to-live; zero disables expiry
    pub ttl: Duration,
}

/// Bucket status snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStatus {
    pub bucket: String,
    pub ttl: Duration,
    /// Number of live (unexpired) entries
    pub values: u64,
}

impl BucketStatus {
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Handle bound to a single bucket
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Name of the bucket this handle is bound to
    fn bucket(&self) -> &str;

    /// Read an entry. Absent or expired keys return `KeyNotFound`.
    async fn get(&self, key: &str) -> Result<KeyValueEntry>;

    /// Last-write-wins upsert; resets the entry's TTL clock
    async fn put(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Unconditionally delete an entry
    async fn purge(&self, key: &str) -> Result<()>;

    /// Report the bucket's configuration and size
    async fn status(&self) -> Result<BucketStatus>;

    async fn put_string(&self, key: &str, value: &str) -> Result<u64> {
        self.put(key, Bytes::copy_from_slice(value.as_bytes())).await
    }
}

/// Bucket-level administration
#[async_trait]
pub trait KeyValueManager: Send + Sync {
    /// Bind to an existing bucket. Missing buckets return `BucketNotFound`.
    async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>>;

    /// Create a bucket. Existing buckets return `BucketExists`.
    async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>>;

    /// Delete a bucket and all of its entries
    async fn delete_key_value(&self, bucket: &str) -> Result<()>;
}
