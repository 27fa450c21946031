//! NATS JetStream key-value backend
//!
//! Each bucket maps to a JetStream KV bucket whose `max_age` is the bucket
//! TTL. JetStream ages every message from its own publish time, so a put
//! restarts the entry's TTL window the same way the in-memory store does.
//!
//! JetStream reports a missing bucket as a missing `KV_<bucket>` stream.
//! The adapter looks the stream up explicitly so that "not found" can be
//! told apart from connection and timeout failures.

use std::fmt::Display;
use std::sync::Arc;

use async_nats::jetstream::context::GetStreamErrorKind;
use async_nats::jetstream::{self, ErrorCode, kv};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use tracing::{debug, info};

use leaderlock_common::{LeaderLockError, Result};

use crate::kv::{BucketConfig, BucketStatus, KeyValueEntry, KeyValueManager, KeyValueStore};

/// JetStream history kept per key; the lock only ever reads the latest value
const BUCKET_HISTORY: i64 = 1;

fn stream_name(bucket: &str) -> String {
    format!("KV_{}", bucket)
}

fn backend_error(op: &str, err: impl Display) -> LeaderLockError {
    LeaderLockError::Backend(format!("nats {} failed: {}", op, err))
}

/// Whether the `KV_<bucket>` stream backing `bucket` exists
async fn bucket_exists(context: &jetstream::Context, bucket: &str) -> Result<bool> {
    match context.get_stream(stream_name(bucket)).await {
        Ok(_) => Ok(true),
        Err(e) => match e.kind() {
            GetStreamErrorKind::JetStream(js) if js.error_code() == ErrorCode::STREAM_NOT_FOUND => {
                Ok(false)
            }
            _ => Err(backend_error("stream lookup", e)),
        },
    }
}

/// Bucket manager backed by a JetStream context
#[derive(Clone)]
pub struct NatsKeyValueManager {
    client: async_nats::Client,
    context: jetstream::Context,
}

impl NatsKeyValueManager {
    pub fn new(client: async_nats::Client) -> Self {
        let context = jetstream::new(client.clone());
        Self { client, context }
    }

    /// Connect to the NATS server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| backend_error("connect", e))?;

        info!(url = %url, "Connected to NATS");

        Ok(Self::new(client))
    }

    /// Underlying connection, shared with event-bus subscribers
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    fn handle(&self, bucket: &str, store: kv::Store) -> Arc<dyn KeyValueStore> {
        Arc::new(NatsKeyValueStore {
            name: bucket.to_string(),
            context: self.context.clone(),
            store,
        })
    }
}

#[async_trait]
impl KeyValueManager for NatsKeyValueManager {
    async fn key_value(&self, bucket: &str) -> Result<Arc<dyn KeyValueStore>> {
        if !bucket_exists(&self.context, bucket).await? {
            return Err(LeaderLockError::BucketNotFound(bucket.to_string()));
        }

        let store = self
            .context
            .get_key_value(bucket)
            .await
            .map_err(|e| backend_error("key-value lookup", e))?;

        Ok(self.handle(bucket, store))
    }

    async fn create_key_value(&self, config: BucketConfig) -> Result<Arc<dyn KeyValueStore>> {
        if config.bucket.is_empty() {
            return Err(LeaderLockError::BadParameter(
                "bucket name must not be empty".to_string(),
            ));
        }

        if bucket_exists(&self.context, &config.bucket).await? {
            return Err(LeaderLockError::BucketExists(config.bucket));
        }

        let store = self
            .context
            .create_key_value(kv::Config {
                bucket: config.bucket.clone(),
                max_age: config.ttl,
                history: BUCKET_HISTORY,
                ..Default::default()
            })
            .await
            .map_err(|e| backend_error("key-value create", e))?;

        info!(bucket = %config.bucket, ttl = ?config.ttl, "Created JetStream key-value bucket");

        Ok(self.handle(&config.bucket, store))
    }

    async fn delete_key_value(&self, bucket: &str) -> Result<()> {
        if !bucket_exists(&self.context, bucket).await? {
            return Err(LeaderLockError::BucketNotFound(bucket.to_string()));
        }

        self.context
            .delete_key_value(bucket)
            .await
            .map_err(|e| backend_error("key-value delete", e))?;

        info!(bucket = %bucket, "Deleted JetStream key-value bucket");
        Ok(())
    }
}

/// Handle bound to one JetStream key-value bucket
pub struct NatsKeyValueStore {
    name: String,
    context: jetstream::Context,
    store: kv::Store,
}

impl NatsKeyValueStore {
    /// Map a failed call to `BucketNotFound` when the bucket has gone away
    async fn classify(&self, op: &str, err: impl Display) -> LeaderLockError {
        match bucket_exists(&self.context, &self.name).await {
            Ok(false) => LeaderLockError::BucketNotFound(self.name.clone()),
            _ => backend_error(op, err),
        }
    }
}

#[async_trait]
impl KeyValueStore for NatsKeyValueStore {
    fn bucket(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<KeyValueEntry> {
        let entry = match self.store.entry(key).await {
            Ok(entry) => entry,
            Err(e) => return Err(self.classify("get", e).await),
        };

        match entry {
            // deletes and purges leave marker entries behind
            Some(entry) if matches!(entry.operation, kv::Operation::Put) => Ok(KeyValueEntry {
                bucket: entry.bucket,
                key: entry.key,
                value: entry.value,
                revision: entry.revision,
                created: DateTime::from_timestamp(
                    entry.created.unix_timestamp(),
                    entry.created.nanosecond(),
                )
                .unwrap_or_default(),
            }),
            _ => {
                debug!(bucket = %self.name, key = %key, "Key not found");
                Err(LeaderLockError::KeyNotFound)
            }
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        match self.store.put(key, value).await {
            Ok(revision) => Ok(revision),
            Err(e) => Err(self.classify("put", e).await),
        }
    }

    async fn purge(&self, key: &str) -> Result<()> {
        match self.store.purge(key).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.classify("purge", e).await),
        }
    }

    async fn status(&self) -> Result<BucketStatus> {
        match self.store.status().await {
            Ok(status) => Ok(BucketStatus {
                bucket: self.name.clone(),
                ttl: status.info.config.max_age,
                values: status.info.state.messages,
            }),
            Err(e) => Err(self.classify("status", e).await),
        }
    }
}
