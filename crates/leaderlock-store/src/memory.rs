// In-memory TTL key-value store
// Buckets live in a shared DashMap; entries expire lazily on access and,
// optionally, through a background sweep task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info};

use leaderlock_common::{LeaderLockError, Result};

use crate::kv::{BucketConfig, BucketStatus, KeyValueEntry, KeyValueManager, KeyValueStore};

type Buckets = DashMap<String, Arc<Bucket>>;

struct StoredEntry {
    value: Bytes,
    revision: u64,
    created: DateTime<Utc>,
    written_at: Instant,
}

struct Bucket {
    ttl: Duration,
    entries: DashMap<String, StoredEntry>,
    revision: AtomicU64,
}

impl Bucket {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            revision: AtomicU64::new(0),
        }
    }

    fn is_expired(&self, entry: &StoredEntry, now: Instant) -> bool {
        !self.ttl.is_zero() && now.duration_since(entry.written_at) >= self.ttl
    }

    /// Remove expired entries, returning how many were dropped
    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }
}

/// In-memory bucket manager
#[derive(Clone)]
pub struct MemoryKeyValueManager {
    buckets: Arc<Buckets>,
    _sweep_handle: Option<Arc<tokio::task::JoinHandle<()>>>,
}

impl Default for MemoryKeyValueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyValueManager {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            _sweep_handle: None,
        }
    }

    /// Start a background task that drops expired entries every `interval`.
    ///
    /// The task stops on its own once the last manager clone is dropped.
    /// Must be called from within a tokio runtime.
    pub fn with_expiry_sweep(self, interval: Duration) -> Self {
        let buckets: Weak<Buckets> = Arc::downgrade(&self.buckets);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(buckets) = buckets.upgrade() else {
                    break;
                };

                let now = Instant::now();
                let removed: usize = buckets.iter().map(|b| b.value().sweep(now)).sum();
                if removed > 0 {
                    debug!(count = removed, "Swept expired key-value entries");
                }
            }
        });

        info!(interval = ?interval, "Key-value expiry sweep started");

        Self {
            buckets: self.buckets,
            _sweep_handle: Some(Arc::new(handle)),
        }
    }

    /// Number of buckets currently defined
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn handle(&self, bucket: &str) -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryKeyValueStore {
            name: bucket.to_string(),
            buckets: self.buckets.clone(),
        })
    }
}

#[async_trait]
impl KeyValueManager for MemoryKeyValueManager {
    async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
        if !self.buckets.contains_key(bucket) {
            return Err(LeaderLockError::BucketNotFound(bucket.to_string()));
        }

        Ok(self.handle(bucket))
    }

    async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>> {
        if config.bucket.is_empty() {
            return Err(LeaderLockError::BadParameter(
                "bucket name must not be empty".to_string(),
            ));
        }

        match self.buckets.entry(config.bucket.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(LeaderLockError::BucketExists(config.bucket));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Bucket::new(config.ttl)));
            }
        }

        info!(bucket = %config.bucket, ttl = ?config.ttl, "Created key-value bucket");

        Ok(self.handle(&config.bucket))
    }

    async fn delete_key_value(&self, bucket: &str) -> Result<()> {
        match self.buckets.remove(bucket) {
            Some(_) => {
                info!(bucket = %bucket, "Deleted key-value bucket");
                Ok(())
            }
            None => Err(LeaderLockError::BucketNotFound(bucket.to_string())),
        }
    }
}

/// Handle bound to one in-memory bucket.
///
/// The bucket is looked up on every call, so deleting it through the
/// manager makes all outstanding handles fail with `BucketNotFound`.
pub struct MemoryKeyValueStore {
    name: String,
    buckets: Arc<Buckets>,
}

impl MemoryKeyValueStore {
    fn lookup(&self) -> Result<Arc<Bucket>> {
        self.buckets
            .get(&self.name)
            .map(|b| b.value().clone())
            .ok_or_else(|| LeaderLockError::BucketNotFound(self.name.clone()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn bucket(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<KeyValueEntry> {
        let bucket = self.lookup()?;
        let now = Instant::now();

        let found = match bucket.entries.get(key) {
            None => return Err(LeaderLockError::KeyNotFound),
            Some(entry) if bucket.is_expired(&entry, now) => None,
            Some(entry) => Some(KeyValueEntry {
                bucket: self.name.clone(),
                key: key.to_string(),
                value: entry.value.clone(),
                revision: entry.revision,
                created: entry.created,
            }),
        };

        match found {
            Some(entry) => Ok(entry),
            None => {
                bucket
                    .entries
                    .remove_if(key, |_, entry| bucket.is_expired(entry, now));
                Err(LeaderLockError::KeyNotFound)
            }
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        let bucket = self.lookup()?;
        let revision = bucket.revision.fetch_add(1, Ordering::Relaxed) + 1;

        bucket.entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                revision,
                created: Utc::now(),
                written_at: Instant::now(),
            },
        );

        Ok(revision)
    }

    async fn purge(&self, key: &str) -> Result<()> {
        let bucket = self.lookup()?;
        bucket.entries.remove(key);
        Ok(())
    }

    async fn status(&self) -> Result<BucketStatus> {
        let bucket = self.lookup()?;
        let now = Instant::now();
        let values = bucket
            .entries
            .iter()
            .filter(|e| !bucket.is_expired(e.value(), now))
            .count() as u64;

        Ok(BucketStatus {
            bucket: self.name.clone(),
            ttl: bucket.ttl,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bucket(manager: &MemoryKeyValueManager, ttl: Duration) -> Arc<dyn KeyValueStore> {
        manager
            .create_key_value(BucketConfig {
                bucket: "test-bucket".to_string(),
                ttl,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_purge() {
        let manager = MemoryKeyValueManager::new();
        let kv = bucket(&manager, Duration::from_secs(60)).await;

        assert_eq!(kv.get("leader").await, Err(LeaderLockError::KeyNotFound));

        let rev1 = kv.put_string("leader", "a").await.unwrap();
        let rev2 = kv.put_string("leader", "b").await.unwrap();
        assert!(rev2 > rev1);

        let entry = kv.get("leader").await.unwrap();
        assert_eq!(entry.value(), b"b");
        assert_eq!(entry.revision, rev2);
        assert_eq!(entry.bucket, "test-bucket");

        kv.purge("leader").await.unwrap();
        assert_eq!(kv.get("leader").await, Err(LeaderLockError::KeyNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let manager = MemoryKeyValueManager::new();
        let kv = bucket(&manager, Duration::from_secs(10)).await;

        kv.put_string("leader", "a").await.unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(kv.get("leader").await.is_ok());

        // Rewriting restarts the TTL window
        kv.put_string("leader", "a").await.unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(kv.get("leader").await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(kv.get("leader").await, Err(LeaderLockError::KeyNotFound));
        assert_eq!(kv.status().await.unwrap().values, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let manager = MemoryKeyValueManager::new();
        let kv = bucket(&manager, Duration::ZERO).await;

        kv.put_string("k", "v").await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(kv.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let manager = MemoryKeyValueManager::new();

        assert!(matches!(
            manager.key_value("test-bucket").await,
            Err(LeaderLockError::BucketNotFound(_))
        ));

        let kv = bucket(&manager, Duration::from_secs(60)).await;
        assert_eq!(kv.bucket(), "test-bucket");

        let again = manager
            .create_key_value(BucketConfig {
                bucket: "test-bucket".to_string(),
                ttl: Duration::from_secs(60),
            })
            .await;
        assert!(matches!(again, Err(LeaderLockError::BucketExists(_))));

        let status = manager.key_value("test-bucket").await.unwrap().status().await.unwrap();
        assert_eq!(status.ttl(), Duration::from_secs(60));

        manager.delete_key_value("test-bucket").await.unwrap();
        assert_eq!(
            kv.get("leader").await,
            Err(LeaderLockError::BucketNotFound("test-bucket".to_string()))
        );
        assert!(kv.put_string("leader", "a").await.is_err());
        assert!(manager.delete_key_value("test-bucket").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_removes_entries() {
        let manager = MemoryKeyValueManager::new().with_expiry_sweep(Duration::from_secs(1));
        let kv = bucket(&manager, Duration::from_secs(5)).await;

        kv.put_string("a", "1").await.unwrap();
        kv.put_string("b", "2").await.unwrap();

        tokio::time::sleep(Duration::from_secs(7)).await;

        let bucket = manager.buckets.get("test-bucket").unwrap().value().clone();
        assert_eq!(bucket.entries.len(), 0);
    }
}
