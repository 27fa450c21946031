//! Main entry point for the leaderlock worker.

use std::sync::Arc;

use leaderlock_server::{Configuration, LoggingReconcileClient, startup};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    if let Some(listen) = configuration.metrics_listen()? {
        leaderlock_server::metrics::install_exporter(listen)?;
    }

    info!(
        bucket = %configuration.bucket_name(),
        ttl = ?configuration.bucket_ttl(),
        interval = ?configuration.reconcile_interval(),
        "Starting leaderlock worker"
    );

    let shutdown = startup::ShutdownSignal::new();
    startup::wait_for_shutdown_signal(&shutdown);

    let store = startup::open_store(&configuration).await?;

    let worker = match startup::start_worker(
        &configuration,
        store.manager.as_ref(),
        Arc::new(LoggingReconcileClient),
        &shutdown,
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) if shutdown.is_shutdown() => {
            info!(error = %e, "Shutdown requested during startup");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let events = match (&store.client, configuration.event_subject()) {
        (Some(client), Some(subject)) => {
            let queue = configuration
                .reconcile_queue()
                .unwrap_or_else(|| configuration.bucket_name());
            let subscribed = startup::subscribe_events(
                client,
                &subject,
                &queue,
                worker.reconciler().clone(),
                &shutdown,
            )
            .await;

            match subscribed {
                Ok(handle) => Some(handle),
                Err(e) => {
                    // stop the loop so the lock is released before exiting
                    shutdown.shutdown();
                    worker.join().await?;
                    return Err(e);
                }
            }
        }
        (None, Some(subject)) => {
            warn!(subject = %subject, "Event subject ignored, the memory store has no event bus");
            None
        }
        _ => None,
    };

    worker.join().await?;

    if let Some(events) = events {
        let handled = events.await?;
        info!(handled, "Event consumer stopped");
    }

    if let Some(client) = store.client {
        client.flush().await?;
    }

    info!("Shutdown complete");
    Ok(())
}
