//! Fault injection for store consumers' tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use leaderlock_common::{LeaderLockError, Result};

use crate::kv::{BucketStatus, KeyValueEntry, KeyValueStore};

/// Wraps a store and fails selected operations on demand.
///
/// Failing calls return `LeaderLockError::Backend` without reaching the
/// inner store. Call counters include failed calls.
pub struct FaultyKeyValueStore {
    inner: Arc<dyn KeyValueStore>,
    fail_get: AtomicBool,
    fail_put: AtomicBool,
    fail_purge: AtomicBool,
    fail_status: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
    purges: AtomicUsize,
}

impl FaultyKeyValueStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            fail_get: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_purge: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
        }
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_purge(&self, fail: bool) {
        self.fail_purge.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn purge_calls(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    fn injected(op: &str) -> LeaderLockError {
        LeaderLockError::Backend(format!("injected {} failure", op))
    }
}

#[async_trait]
impl KeyValueStore for FaultyKeyValueStore {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn get(&self, key: &str) -> Result<KeyValueEntry> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::injected("get"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.inner.put(key, value).await
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        if self.fail_purge.load(Ordering::SeqCst) {
            return Err(Self::injected("purge"));
        }
        self.inner.purge(key).await
    }

    async fn status(&self) -> Result<BucketStatus> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Self::injected("status"));
        }
        self.inner.status().await
    }
}
