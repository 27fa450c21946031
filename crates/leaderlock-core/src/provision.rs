// Bucket provisioning
// Idempotently ensures a named TTL bucket exists

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use leaderlock_common::{LeaderLockError, Result};
use leaderlock_store::{BucketConfig, KeyValueManager, KeyValueStore};

/// Return the key-value bucket with the given name, creating it with `ttl`
/// if it does not exist yet.
///
/// An existing bucket is returned unchanged even when its TTL differs from
/// `ttl`. A bucket that appears between the lookup and the create (a peer
/// replica provisioning at the same time) counts as existing. Empty names and a zero TTL are rejected before the store is
/// contacted.
pub async fn new_key_value(
    manager: &dyn KeyValueManager,
    name: &str,
    ttl: Duration,
) -> Result<Arc<dyn KeyValueStore>> {
    if name.is_empty() {
        return Err(LeaderLockError::BadParameter(
            "bucket name must not be empty".to_string(),
        ));
    }
    if ttl.is_zero() {
        return Err(LeaderLockError::BadParameter(
            "bucket ttl must be non-zero".to_string(),
        ));
    }

    match manager.key_value(name).await {
        Ok(kv) => {
            debug!(bucket = %name, "Using existing key-value bucket");
            Ok(kv)
        }
        Err(LeaderLockError::BucketNotFound(_)) => {
            let created = manager
                .create_key_value(BucketConfig {
                    bucket: name.to_string(),
                    ttl,
                })
                .await;

            match created {
                Ok(kv) => {
                    info!(bucket = %name, ttl = ?ttl, "Provisioned key-value bucket");
                    Ok(kv)
                }
                // another replica created it between our lookup and create
                Err(LeaderLockError::BucketExists(_)) => {
                    debug!(bucket = %name, "Key-value bucket created concurrently, reopening");
                    manager.key_value(name).await
                }
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use leaderlock_store::MemoryKeyValueManager;

    use super::*;

    // Counts every backend call so validation can be shown to happen first
    struct CountingManager {
        inner: MemoryKeyValueManager,
        calls: AtomicUsize,
        fail_lookup: bool,
    }

    impl CountingManager {
        fn new(fail_lookup: bool) -> Self {
            Self {
                inner: MemoryKeyValueManager::new(),
                calls: AtomicUsize::new(0),
                fail_lookup,
            }
        }
    }

    #[async_trait]
    impl KeyValueManager for CountingManager {
        async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup {
                return Err(LeaderLockError::Backend("connection refused".to_string()));
            }
            self.inner.key_value(bucket).await
        }

        async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create_key_value(config).await
        }

        async fn delete_key_value(&self, bucket: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete_key_value(bucket).await
        }
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters_without_store_contact() {
        let manager = CountingManager::new(false);

        let err = new_key_value(&manager, "test-bucket", Duration::ZERO)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LeaderLockError::BadParameter(_)));

        let err = new_key_value(&manager, "", Duration::from_secs(60))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LeaderLockError::BadParameter(_)));

        assert_eq!(manager.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_creates_then_reuses_bucket() {
        let manager = CountingManager::new(false);
        let ttl = Duration::from_secs(60);

        // first call should create a new bucket
        let first = new_key_value(&manager, "test-bucket", ttl).await.unwrap();
        assert_eq!(first.bucket(), "test-bucket");
        assert_eq!(first.status().await.unwrap().ttl(), ttl);
        first.put_string("leader", "keep-me").await.unwrap();

        // second call should return the existing bucket untouched
        let second = new_key_value(&manager, "test-bucket", ttl).await.unwrap();
        assert_eq!(second.bucket(), "test-bucket");
        assert_eq!(second.status().await.unwrap().ttl(), ttl);
        assert_eq!(second.get("leader").await.unwrap().value(), b"keep-me");
    }

    #[tokio::test]
    async fn test_ttl_mismatch_is_not_reported() {
        let manager = MemoryKeyValueManager::new();

        new_key_value(&manager, "test-bucket", Duration::from_secs(60))
            .await
            .unwrap();
        let kv = new_key_value(&manager, "test-bucket", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(kv.status().await.unwrap().ttl(), Duration::from_secs(60));
    }

    // Hides the bucket from the first lookup while a peer creates it
    struct RacingManager {
        inner: MemoryKeyValueManager,
        ttl: Duration,
        raced: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueManager for RacingManager {
        async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
            if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner
                    .create_key_value(BucketConfig {
                        bucket: bucket.to_string(),
                        ttl: self.ttl,
                    })
                    .await?
                    .put_string("leader", "peer")
                    .await?;
                return Err(LeaderLockError::BucketNotFound(bucket.to_string()));
            }
            self.inner.key_value(bucket).await
        }

        async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>> {
            self.inner.create_key_value(config).await
        }

        async fn delete_key_value(&self, bucket: &str) -> Result<()> {
            self.inner.delete_key_value(bucket).await
        }
    }

    #[tokio::test]
    async fn test_concurrently_created_bucket_is_reused() {
        let manager = RacingManager {
            inner: MemoryKeyValueManager::new(),
            ttl: Duration::from_secs(30),
            raced: AtomicUsize::new(0),
        };

        let kv = new_key_value(&manager, "fleet", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(kv.bucket(), "fleet");
        assert_eq!(kv.get("leader").await.unwrap().value(), b"peer");
        assert_eq!(kv.status().await.unwrap().ttl(), Duration::from_secs(30));
        assert_eq!(manager.inner.bucket_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let manager = CountingManager::new(true);

        let err = new_key_value(&manager, "test-bucket", Duration::from_secs(60))
            .await
            .err()
            .unwrap();
        assert_eq!(err, LeaderLockError::Backend("connection refused".to_string()));
        assert_eq!(manager.inner.bucket_count(), 0);
    }
}
