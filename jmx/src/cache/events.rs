//! Resource change notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A cached resource observed with a different value than last time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub uri: String,
    pub old_value: Value,
    pub new_value: Value,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(uri: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            uri: uri.into(),
            old_value,
            new_value,
            timestamp: Utc::now(),
        }
    }
}

/// Receives resource notifications.
///
/// Each call runs on its own task; implementations may be slow or fail
/// without affecting the read that produced the event.
#[async_trait]
pub trait ResourceChangeListener: Send + Sync {
    async fn on_resource_changed(&self, event: &ChangeEvent);

    async fn on_resources_added(&self, _uris: &[String]) {}

    async fn on_resources_removed(&self, _uris: &[String]) {}
}
