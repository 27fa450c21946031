// Integration tests for the worker bootstrap
// Two workers in one process share an in-memory bucket

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leaderlock_common::Result;
use leaderlock_server::startup::{ShutdownSignal, start_worker};
use leaderlock_server::{Cli, Configuration, LoggingReconcileClient};
use leaderlock_store::{BucketConfig, KeyValueManager, KeyValueStore, MemoryKeyValueManager};

fn test_configuration(bucket: &str) -> Configuration {
    Configuration::from_cli(Cli {
        config_file: Some("conf/does-not-exist".to_string()),
        bucket: Some(bucket.to_string()),
        ttl_secs: Some(60),
        interval_secs: Some(20),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_one_worker_leads_and_releases_on_shutdown() {
    let manager = MemoryKeyValueManager::new();
    let configuration = test_configuration("test-bucket-workers");
    let shutdown = ShutdownSignal::new();

    let first = start_worker(
        &configuration,
        &manager,
        Arc::new(LoggingReconcileClient),
        &shutdown,
    )
    .await
    .unwrap();
    let second = start_worker(
        &configuration,
        &manager,
        Arc::new(LoggingReconcileClient),
        &shutdown,
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;

    let leaders = [first.is_leader(), second.is_leader()]
        .iter()
        .filter(|l| **l)
        .count();
    assert_eq!(leaders, 1);
    assert_eq!(manager.bucket_count(), 1);

    shutdown.shutdown();
    first.join().await.unwrap();
    second.join().await.unwrap();

    let bucket = manager.key_value("test-bucket-workers").await.unwrap();
    assert!(bucket.get("leader").await.is_err());
}

// Fires shutdown while the worker is still provisioning its bucket
struct InterruptingManager {
    inner: MemoryKeyValueManager,
    shutdown: ShutdownSignal,
}

#[async_trait]
impl KeyValueManager for InterruptingManager {
    async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
        self.shutdown.shutdown();
        self.inner.key_value(bucket).await
    }

    async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>> {
        self.inner.create_key_value(config).await
    }

    async fn delete_key_value(&self, bucket: &str) -> Result<()> {
        self.inner.delete_key_value(bucket).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_startup_stops_worker() {
    let shutdown = ShutdownSignal::new();
    let manager = InterruptingManager {
        inner: MemoryKeyValueManager::new(),
        shutdown: shutdown.clone(),
    };
    let configuration = test_configuration("test-bucket-interrupted");

    let worker = start_worker(
        &configuration,
        &manager,
        Arc::new(LoggingReconcileClient),
        &shutdown,
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), worker.join())
        .await
        .expect("worker should stop after a shutdown sent during startup")
        .unwrap();

    let bucket = manager.inner.key_value("test-bucket-interrupted").await.unwrap();
    assert!(bucket.get("leader").await.is_err());
}

#[tokio::test]
async fn test_start_after_shutdown_is_rejected() {
    let manager = MemoryKeyValueManager::new();
    let shutdown = ShutdownSignal::new();
    shutdown.shutdown();

    let result = start_worker(
        &test_configuration("test-bucket-late"),
        &manager,
        Arc::new(LoggingReconcileClient),
        &shutdown,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(manager.bucket_count(), 0);
}
