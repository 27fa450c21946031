//! Event-bus consumer
//!
//! Every replica joins the same NATS queue group on the event subject, so
//! each create/update/delete message reaches exactly one worker regardless
//! of which replica currently leads.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use leaderlock_reconciler::Reconciler;

use super::shutdown::ShutdownSignal;

/// Feed raw messages to the reconciler until the stream ends or shutdown
/// fires. Returns the number of messages handled successfully.
pub async fn dispatch_events<S>(
    mut messages: S,
    reconciler: Arc<Reconciler>,
    mut shutdown: broadcast::Receiver<()>,
) -> usize
where
    S: Stream<Item = Bytes> + Unpin,
{
    let mut handled = 0;

    loop {
        tokio::select! {
            message = messages.next() => {
                let Some(payload) = message else {
                    debug!("Event stream closed");
                    break;
                };

                match reconciler.handle_message(&payload).await {
                    Ok(summary) => {
                        handled += 1;
                        debug!(items = summary.total(), "Handled event");
                    }
                    Err(e) => warn!(error = %e, "Failed to handle event"),
                }
            }
            _ = shutdown.recv() => {
                break;
            }
        }
    }

    handled
}

/// Join `queue` on `subject` and dispatch its messages in a background task.
///
/// Dropping the subscriber when the task ends unsubscribes from the server.
pub async fn subscribe_events(
    client: &async_nats::Client,
    subject: &str,
    queue: &str,
    reconciler: Arc<Reconciler>,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<JoinHandle<usize>> {
    let receiver = shutdown.subscribe();
    let subscriber = client
        .queue_subscribe(subject.to_string(), queue.to_string())
        .await?;

    if shutdown.is_shutdown() {
        info!(subject = %subject, "Shutdown requested, not consuming events");
        return Ok(tokio::spawn(async { 0 }));
    }

    info!(subject = %subject, queue = %queue, "Subscribed to event subject");

    let messages = subscriber.map(|message| message.payload);
    Ok(tokio::spawn(dispatch_events(messages, reconciler, receiver)))
}
