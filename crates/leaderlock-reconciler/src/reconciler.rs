//! Leader-gated reconciliation loop
//!
//! Every replica runs a `Reconciler`. Each tick renews (or tries to take)
//! the leader lock and only the current leader runs a full reconcile pass.
//! Event-driven create/update/delete calls are not gated; the event bus
//! already delivers each message to one queue-group member.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info, warn};

use leaderlock_core::Locker;

use crate::client::{EventAction, EventMessage, ReconcileClient};
use crate::summary::Summary;

/// Default time between leadership checks
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Reconciler construction parameters
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Time between ticks; must be shorter than the lock bucket TTL
    pub interval: Duration,
    /// Event-bus queue group the replica consumes from. Each message on the
    /// subject goes to one member of the group.
    pub queue: Option<String>,
    /// Logging collaborator, discards output when unset
    pub dispatch: Option<Dispatch>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            queue: None,
            dispatch: None,
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// This replica leads and ran a reconcile pass
    Led(Summary),
    /// Another replica leads
    Follower,
    /// Leadership could not be determined; treated as not leading
    Unknown,
}

pub struct Reconciler {
    client: Arc<dyn ReconcileClient>,
    locker: Arc<Locker>,
    interval: Duration,
    queue: Option<String>,
    dispatch: Dispatch,
    leader: AtomicBool,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ReconcileClient>,
        locker: Arc<Locker>,
        config: ReconcilerConfig,
    ) -> Self {
        let dispatch = config.dispatch.unwrap_or_else(Dispatch::none);

        tracing::dispatcher::with_default(&dispatch, || {
            debug!(id = %locker.id(), queue = ?config.queue, "Creating new reconciler");
        });

        Self {
            client,
            locker,
            interval: config.interval,
            queue: config.queue,
            dispatch,
            leader: AtomicBool::new(false),
        }
    }

    pub fn locker(&self) -> &Arc<Locker> {
        &self.locker
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Whether the most recent tick found this replica leading
    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::Acquire)
    }

    /// Dispatch one event-bus message to the downstream client
    pub async fn handle_event(&self, action: EventAction, payload: &Value) -> anyhow::Result<Summary> {
        let client = self.client.clone();
        async move {
            debug!(action = %action, "Handling event");
            match action {
                EventAction::Create => client.create(payload).await,
                EventAction::Update => client.update(payload).await,
                EventAction::Delete => client.delete(payload).await,
            }
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    /// Decode a raw event-bus message and dispatch it
    pub async fn handle_message(&self, data: &[u8]) -> anyhow::Result<Summary> {
        let message: EventMessage =
            serde_json::from_slice(data).context("invalid event message")?;
        self.handle_event(message.action, &message.payload).await
    }

    /// Renew or acquire leadership once; reconcile if leading
    pub async fn tick(&self) -> TickOutcome {
        self.tick_inner().with_subscriber(self.dispatch.clone()).await
    }

    async fn tick_inner(&self) -> TickOutcome {
        match self.locker.acquire_lead().await {
            Ok(true) => {
                if !self.leader.swap(true, Ordering::AcqRel) {
                    info!(id = %self.locker.id(), "Became leader, starting reconciliation");
                }

                let summary = match self.client.reconcile_all().await {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!(error = %e, "Reconcile pass failed");
                        let mut summary = Summary::new();
                        summary.add_error(e.to_string());
                        summary
                    }
                };

                debug!(
                    created = summary.created().len(),
                    updated = summary.updated().len(),
                    deleted = summary.deleted().len(),
                    errors = summary.errors().len(),
                    "Reconcile pass complete"
                );

                TickOutcome::Led(summary)
            }
            Ok(false) => {
                if self.leader.swap(false, Ordering::AcqRel) {
                    warn!(id = %self.locker.id(), "Lost leadership");
                }
                TickOutcome::Follower
            }
            Err(e) => {
                self.leader.store(false, Ordering::Release);
                error!(id = %self.locker.id(), error = %e, "Unable to determine leadership");
                TickOutcome::Unknown
            }
        }
    }

    /// Tick on the configured interval until `shutdown` fires, then release
    /// the leader lock.
    pub async fn run(&self, shutdown: broadcast::Receiver<()>) {
        self.run_inner(shutdown)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn run_inner(&self, mut shutdown: broadcast::Receiver<()>) {
        let ttl = self.locker.ttl().await;
        if !ttl.is_zero() && self.interval >= ttl {
            warn!(
                interval = ?self.interval,
                ttl = ?ttl,
                "Reconcile interval is not shorter than the lock ttl, leadership will flap"
            );
        }

        info!(
            id = %self.locker.id(),
            bucket = %self.locker.name(),
            interval = ?self.interval,
            "Starting reconciler"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_inner().await;
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        self.leader.store(false, Ordering::Release);

        match self.locker.release_lead().await {
            Ok(()) => info!(id = %self.locker.id(), "Reconciler stopped"),
            Err(e) => error!(
                id = %self.locker.id(),
                error = %e,
                "Failed to release leader lock, it will expire after the ttl"
            ),
        }
    }
}
