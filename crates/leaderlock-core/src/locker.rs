//! TTL-lease leader lock
//!
//! A `Locker` binds an [`Identity`] to one key in a TTL bucket. Holding the
//! key means holding leadership; the bucket TTL drops the key if the holder
//! stops renewing it. Callers keep leadership by calling
//! [`Locker::acquire_lead`] on an interval shorter than the bucket TTL.
//!
//! Acquire and release are a read followed by a conditional write. They are
//! not compare-and-swap operations, so two lockers racing on an empty key
//! can both believe they lead until the next round of acquires converges.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info, warn};

use leaderlock_common::{DEFAULT_KEY_NAME, LeaderLockError, Result};
use leaderlock_store::KeyValueStore;

use crate::identity::Identity;

/// Locker construction parameters
///
/// Unset fields fall back to defaults when the locker is built: a freshly
/// generated identity, the `"leader"` key, and a dispatcher that discards
/// all log output.
#[derive(Clone)]
pub struct LockerConfig {
    /// Identity to claim the lock with
    pub id: Option<Identity>,
    /// Bucket holding the lock entry
    pub store: Arc<dyn KeyValueStore>,
    /// Lock entry key
    pub key: Option<String>,
    /// Logging collaborator
    pub dispatch: Option<Dispatch>,
}

impl LockerConfig {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            id: None,
            store,
            key: None,
            dispatch: None,
        }
    }

    pub fn with_id(mut self, id: Identity) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> Locker {
        Locker::new(self)
    }
}

/// Distributed leader lock backed by a TTL key-value bucket
pub struct Locker {
    id: Identity,
    store: Arc<dyn KeyValueStore>,
    key: String,
    dispatch: Dispatch,
}

impl Debug for Locker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("id", &self.id)
            .field("bucket", &self.store.bucket())
            .field("key", &self.key)
            .finish()
    }
}

impl Locker {
    /// Build a locker. Never contacts the store.
    pub fn new(config: LockerConfig) -> Self {
        Self {
            id: config.id.unwrap_or_else(Identity::generate),
            store: config.store,
            key: config
                .key
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_KEY_NAME.to_string()),
            dispatch: config.dispatch.unwrap_or_else(Dispatch::none),
        }
    }

    pub fn builder(store: Arc<dyn KeyValueStore>) -> LockerConfig {
        LockerConfig::new(store)
    }

    pub fn id(&self) -> Identity {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Attempt to acquire (or keep) the leader lock.
    ///
    /// Returns `Ok(true)` when this locker leads and `Ok(false)` when another
    /// identity holds the lock. An `Err` means leadership is unknown; callers
    /// should behave as if they do not lead.
    pub async fn acquire_lead(&self) -> Result<bool> {
        let result = self
            .try_acquire_lead()
            .with_subscriber(self.dispatch.clone())
            .await;

        let outcome = match &result {
            Ok(true) => "leader",
            Ok(false) => "follower",
            Err(_) => "error",
        };
        metrics::counter!("leaderlock_acquire_total", "outcome" => outcome).increment(1);

        result
    }

    async fn try_acquire_lead(&self) -> Result<bool> {
        let entry = match self.store.get(&self.key).await {
            Ok(entry) => entry,
            Err(LeaderLockError::KeyNotFound) => {
                // no holder, create the lock and take the lead
                if let Err(e) = self.store.put_string(&self.key, &self.id.to_string()).await {
                    warn!(
                        id = %self.id,
                        error = %e,
                        "Unable to create leader lock, still proceeding as lead"
                    );
                    return Ok(true);
                }

                info!(id = %self.id, key = %self.key, "Obtained leader lock");
                return Ok(true);
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Error getting lock key from kv store");
                return Err(e);
            }
        };

        debug!(
            key = %self.key,
            value = %String::from_utf8_lossy(entry.value()),
            "Got lock entry"
        );

        let holder = match Identity::from_value(entry.value()) {
            Ok(holder) => holder,
            Err(parse_err) => {
                warn!(
                    key = %self.key,
                    error = %parse_err,
                    "Unable to parse lock value, overwriting it to take the lead"
                );

                if let Err(e) = self.store.put_string(&self.key, &self.id.to_string()).await {
                    error!(id = %self.id, error = %e, "Error updating lock");
                    return Err(e);
                }

                return Ok(true);
            }
        };

        if holder != self.id {
            info!(id = %self.id, holder = %holder, "Existing lock found, another locker leads");
            return Ok(false);
        }

        debug!(id = %self.id, "Existing lock found, this locker leads");

        // rewrite the value so the ttl does not lapse
        if let Err(e) = self.store.put_string(&self.key, &self.id.to_string()).await {
            warn!(id = %self.id, error = %e, "Unable to refresh leader lock");
        }

        Ok(true)
    }

    /// Release the leader lock if this locker holds it.
    ///
    /// Releasing an absent lock, a lock held by another identity, or a lock
    /// with an unparseable value is a no-op.
    pub async fn release_lead(&self) -> Result<()> {
        let result = self
            .try_release_lead()
            .with_subscriber(self.dispatch.clone())
            .await;

        let outcome = match &result {
            Ok(true) => "released",
            Ok(false) => "noop",
            Err(_) => "error",
        };
        metrics::counter!("leaderlock_release_total", "outcome" => outcome).increment(1);

        result.map(|_| ())
    }

    async fn try_release_lead(&self) -> Result<bool> {
        let entry = match self.store.get(&self.key).await {
            Ok(entry) => entry,
            Err(LeaderLockError::KeyNotFound) => return Ok(false),
            Err(e) => {
                error!(key = %self.key, error = %e, "Error getting lock key from kv store");
                return Err(e);
            }
        };

        debug!(
            key = %self.key,
            value = %String::from_utf8_lossy(entry.value()),
            "Got lock entry"
        );

        match Identity::from_value(entry.value()) {
            Ok(holder) if holder == self.id => {
                self.store.purge(&self.key).await?;
                info!(id = %self.id, key = %self.key, "Released leader lock");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Name of the bucket holding the lock
    pub fn name(&self) -> &str {
        self.store.bucket()
    }

    /// TTL configured on the lock bucket, or zero if it cannot be read
    pub async fn ttl(&self) -> Duration {
        let status = self
            .store
            .status()
            .with_subscriber(self.dispatch.clone())
            .await;

        match status {
            Ok(status) => status.ttl(),
            Err(e) => {
                tracing::dispatcher::with_default(&self.dispatch, || {
                    error!(bucket = %self.name(), error = %e, "Unable to read lock bucket status");
                });
                Duration::ZERO
            }
        }
    }
}
