//! Downstream reconcile contract and event actions

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use leaderlock_common::{EVENT_CREATE, EVENT_DELETE, EVENT_UPDATE, LeaderLockError};

use crate::summary::Summary;

/// Action carried by an event-bus message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    Create,
    Update,
    Delete,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Create => EVENT_CREATE,
            EventAction::Update => EVENT_UPDATE,
            EventAction::Delete => EVENT_DELETE,
        }
    }
}

impl Display for EventAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = LeaderLockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            EVENT_CREATE => Ok(EventAction::Create),
            EVENT_UPDATE => Ok(EventAction::Update),
            EVENT_DELETE => Ok(EventAction::Delete),
            _ => Err(LeaderLockError::BadParameter(format!(
                "invalid event action: {}",
                s
            ))),
        }
    }
}

impl Serialize for EventAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Event-bus message body: `{"action": "CREATE", "payload": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub action: EventAction,
    #[serde(default)]
    pub payload: Value,
}

/// Creates, updates and deletes objects in a downstream system
#[async_trait]
pub trait ReconcileClient: Send + Sync {
    /// Create the object in the downstream system
    async fn create(&self, payload: &Value) -> anyhow::Result<Summary>;

    /// Update the object in the downstream system
    async fn update(&self, payload: &Value) -> anyhow::Result<Summary>;

    /// Delete the object from the downstream system
    async fn delete(&self, payload: &Value) -> anyhow::Result<Summary>;

    /// Full pass over the downstream system, run only while leading
    async fn reconcile_all(&self) -> anyhow::Result<Summary> {
        Ok(Summary::default())
    }
}
