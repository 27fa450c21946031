//! JetStream key-value backend tests
//!
//! These tests require a NATS server with JetStream enabled.
//!
//! To run these tests:
//! 1. Start a server: `nats-server -js`
//! 2. Run: cargo test -p leaderlock-store --test nats_test -- --ignored
//!
//! `NATS_URL` overrides the default server address.

#![cfg(feature = "nats")]

use std::time::Duration;

use leaderlock_common::LeaderLockError;
use leaderlock_store::{BucketConfig, KeyValueManager, NatsKeyValueManager};

const TEST_SERVER_ADDR: &str = "nats://127.0.0.1:4222";

async fn connect() -> NatsKeyValueManager {
    let url = std::env::var("NATS_URL").unwrap_or_else(|_| TEST_SERVER_ADDR.to_string());
    NatsKeyValueManager::connect(&url).await.unwrap()
}

fn unique_bucket(prefix: &str) -> String {
    format!("{}-{}", prefix, std::process::id())
}

#[tokio::test]
#[ignore = "requires running nats server"]
async fn test_bucket_lifecycle_errors() {
    let manager = connect().await;
    let bucket = unique_bucket("test-lifecycle");

    assert_eq!(
        manager.key_value(&bucket).await.err(),
        Some(LeaderLockError::BucketNotFound(bucket.clone()))
    );

    let config = BucketConfig {
        bucket: bucket.clone(),
        ttl: Duration::from_secs(60),
    };
    manager.create_key_value(config.clone()).await.unwrap();
    assert_eq!(
        manager.create_key_value(config).await.err(),
        Some(LeaderLockError::BucketExists(bucket.clone()))
    );

    manager.delete_key_value(&bucket).await.unwrap();
    assert_eq!(
        manager.delete_key_value(&bucket).await.err(),
        Some(LeaderLockError::BucketNotFound(bucket.clone()))
    );
}

#[tokio::test]
#[ignore = "requires running nats server"]
async fn test_put_get_purge() {
    let manager = connect().await;
    let bucket = unique_bucket("test-entries");
    let kv = manager
        .create_key_value(BucketConfig {
            bucket: bucket.clone(),
            ttl: Duration::from_secs(60),
        })
        .await
        .unwrap();

    assert_eq!(kv.get("leader").await.err(), Some(LeaderLockError::KeyNotFound));

    let first = kv.put_string("leader", "node-a").await.unwrap();
    let second = kv.put_string("leader", "node-b").await.unwrap();
    assert!(second > first);

    let entry = kv.get("leader").await.unwrap();
    assert_eq!(entry.value(), b"node-b");
    assert_eq!(entry.revision, second);

    let status = kv.status().await.unwrap();
    assert_eq!(status.ttl(), Duration::from_secs(60));

    kv.purge("leader").await.unwrap();
    assert_eq!(kv.get("leader").await.err(), Some(LeaderLockError::KeyNotFound));

    manager.delete_key_value(&bucket).await.unwrap();
    assert_eq!(
        kv.get("leader").await.err(),
        Some(LeaderLockError::BucketNotFound(bucket))
    );
}

#[tokio::test]
#[ignore = "requires running nats server"]
async fn test_entry_expires_after_ttl() {
    let manager = connect().await;
    let bucket = unique_bucket("test-expiry");
    let kv = manager
        .create_key_value(BucketConfig {
            bucket: bucket.clone(),
            ttl: Duration::from_secs(1),
        })
        .await
        .unwrap();

    kv.put_string("leader", "node-a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(kv.get("leader").await.err(), Some(LeaderLockError::KeyNotFound));

    manager.delete_key_value(&bucket).await.unwrap();
}
