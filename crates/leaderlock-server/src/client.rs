// Default downstream client for the worker binary
// Logs every action instead of calling out to a real system

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use leaderlock_reconciler::{ReconcileClient, Summary};

/// Reconcile client that records actions in the log only
#[derive(Debug, Default, Clone)]
pub struct LoggingReconcileClient;

impl LoggingReconcileClient {
    fn item_id(payload: &Value) -> String {
        payload
            .get("id")
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl ReconcileClient for LoggingReconcileClient {
    async fn create(&self, payload: &Value) -> anyhow::Result<Summary> {
        let id = Self::item_id(payload);
        info!(id = %id, "create");
        let mut summary = Summary::new();
        summary.add_created(id);
        Ok(summary)
    }

    async fn update(&self, payload: &Value) -> anyhow::Result<Summary> {
        let id = Self::item_id(payload);
        info!(id = %id, "update");
        let mut summary = Summary::new();
        summary.add_updated(id);
        Ok(summary)
    }

    async fn delete(&self, payload: &Value) -> anyhow::Result<Summary> {
        let id = Self::item_id(payload);
        info!(id = %id, "delete");
        let mut summary = Summary::new();
        summary.add_deleted(id);
        Ok(summary)
    }

    async fn reconcile_all(&self) -> anyhow::Result<Summary> {
        info!("Running reconcile pass as leader");
        Ok(Summary::new())
    }
}
