//! Worker bootstrap: open the key-value backend, provision the lock bucket,
//! build the locker and start the reconcile loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use leaderlock_core::{Locker, new_key_value};
use leaderlock_reconciler::{ReconcileClient, Reconciler, ReconcilerConfig};
use leaderlock_store::{KeyValueManager, MemoryKeyValueManager, NatsKeyValueManager};

use crate::config::{Configuration, StoreBackend};

use super::shutdown::ShutdownSignal;

/// How often the in-process store drops expired entries
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Key-value backend selected by configuration
pub struct StoreConnection {
    pub manager: Arc<dyn KeyValueManager>,
    /// NATS connection, present for the `nats` backend
    pub client: Option<async_nats::Client>,
}

/// Open the configured key-value backend
pub async fn open_store(configuration: &Configuration) -> anyhow::Result<StoreConnection> {
    let backend = configuration.store_backend()?;

    let connection = match backend {
        StoreBackend::Memory => StoreConnection {
            manager: Arc::new(MemoryKeyValueManager::new().with_expiry_sweep(EXPIRY_SWEEP_INTERVAL)),
            client: None,
        },
        StoreBackend::Nats => {
            let manager = NatsKeyValueManager::connect(&configuration.nats_url()).await?;
            let client = manager.client().clone();
            StoreConnection {
                manager: Arc::new(manager),
                client: Some(client),
            }
        }
    };

    info!(backend = %backend, "Key-value store ready");
    Ok(connection)
}

/// A running reconcile loop
pub struct Worker {
    reconciler: Arc<Reconciler>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn is_leader(&self) -> bool {
        self.reconciler.is_leader()
    }

    /// Wait for the loop to finish; it exits once shutdown is signalled
    pub async fn join(self) -> anyhow::Result<()> {
        self.handle.await?;
        Ok(())
    }
}

/// Start a worker whose logs go to the current default dispatcher.
///
/// Fails without touching the store if `shutdown` has already fired.
pub async fn start_worker(
    configuration: &Configuration,
    manager: &dyn KeyValueManager,
    client: Arc<dyn ReconcileClient>,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<Worker> {
    // subscribe before provisioning so a signal during startup is not lost
    let receiver = shutdown.subscribe();
    if shutdown.is_shutdown() {
        anyhow::bail!("shutdown requested before the worker started");
    }

    let store = new_key_value(
        manager,
        &configuration.bucket_name(),
        configuration.bucket_ttl(),
    )
    .await?;

    let dispatch = tracing::dispatcher::get_default(|d| d.clone());

    let locker = Arc::new(
        Locker::builder(store)
            .with_key(configuration.lock_key())
            .with_dispatch(dispatch.clone())
            .build(),
    );

    info!(
        id = %locker.id(),
        bucket = %locker.name(),
        key = %locker.key(),
        "Leader lock ready"
    );

    let reconciler = Arc::new(Reconciler::new(
        client,
        locker,
        ReconcilerConfig {
            interval: configuration.reconcile_interval(),
            queue: configuration.reconcile_queue(),
            dispatch: Some(dispatch),
        },
    ));

    let handle = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.run(receiver).await })
    };

    Ok(Worker { reconciler, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;

    #[tokio::test]
    async fn test_open_memory_store() {
        let configuration = Configuration::from_cli(Cli {
            config_file: Some("conf/does-not-exist".to_string()),
            store: Some("memory".to_string()),
            ..Default::default()
        })
        .unwrap();

        let connection = open_store(&configuration).await.unwrap();
        assert!(connection.client.is_none());
        assert!(connection.manager.key_value("leaderlock").await.is_err());
    }
}
