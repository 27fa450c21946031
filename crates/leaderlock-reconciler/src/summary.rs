use serde::{Deserialize, Serialize};

/// Items touched by a reconcile action, grouped by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    created: Vec<String>,
    #[serde(default)]
    updated: Vec<String>,
    #[serde(default)]
    deleted: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn updated(&self) -> &[String] {
        &self.updated
    }

    pub fn deleted(&self) -> &[String] {
        &self.deleted
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn add_created(&mut self, item: impl Into<String>) {
        self.created.push(item.into());
    }

    pub fn add_updated(&mut self, item: impl Into<String>) {
        self.updated.push(item.into());
    }

    pub fn add_deleted(&mut self, item: impl Into<String>) {
        self.deleted.push(item.into());
    }

    pub fn add_error(&mut self, item: impl Into<String>) {
        self.errors.push(item.into());
    }

    /// Append every list of `other` onto this summary
    pub fn merge(&mut self, other: Summary) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
        self.errors.extend(other.errors);
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
