//! Connection manager.
//!
//! Dials endpoints through a [`Connector`], keeps the registry's descriptors in
//! step with what happened, and hands out the active live handle.
//!
//! Connection failures are recorded on the descriptor as FAILED plus a message
//! rather than returned as errors. Only [`ConnectionManager::connection`] fails
//! fast, because asking for a handle that does not exist is a caller bug.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{
    config::{ConnectionConfig, ConnectionKind, JmxConfig},
    descriptor::{ConnectionDescriptor, ConnectionStatus},
    metrics::JmxMetrics,
    registry::ConnectionRegistry,
};
use crate::{
    error::{JmxError, JmxResult},
    upstream::{Connector, LiveConnection, REQUEST_TIMEOUT_KEY},
};

pub const DEFAULT_CONNECTION_ID: &str = "default";
pub const DEFAULT_CONNECTION_NAME: &str = "Default Remote Connection";

const LOCAL_REJECTED: &str = "LOCAL connections are deprecated. Use discovery service to find local processes and connect via JMX URLs.";

/// Summary of the active connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub name: String,
    pub kind: ConnectionKind,
    pub url: Option<String>,
    pub status: ConnectionStatus,
    pub connected: bool,
    pub mbean_count: Option<u64>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&ConnectionDescriptor> for ConnectionInfo {
    fn from(d: &ConnectionDescriptor) -> Self {
        Self {
            id: d.id().to_string(),
            name: d.name().to_string(),
            kind: d.kind(),
            url: d.url().map(String::from),
            status: d.status(),
            connected: d.is_connected(),
            mbean_count: d.mbean_count(),
            connected_at: d.connected_at(),
            last_checked: d.last_checked(),
            error: d.error().map(String::from),
        }
    }
}

pub struct ConnectionManager {
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn Connector>,
    metrics: Arc<JmxMetrics>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<ConnectionRegistry>, connector: Arc<dyn Connector>) -> Self {
        Self {
            registry,
            connector,
            metrics: Arc::new(JmxMetrics::new()),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<JmxMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn metrics(&self) -> &Arc<JmxMetrics> {
        &self.metrics
    }

    /// Dial a REMOTE descriptor and probe it.
    ///
    /// Never fails: the returned descriptor is CONNECTED with a live handle, or
    /// FAILED with the reason.
    pub async fn build_remote(&self, descriptor: ConnectionDescriptor) -> ConnectionDescriptor {
        let Some(url) = descriptor
            .url()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
        else {
            warn!("Connection '{}' has no URL", descriptor.id());
            self.metrics.record_connection_attempt(false);
            return descriptor.with_status(
                ConnectionStatus::Failed,
                Some("Remote connection requires a URL".to_string()),
            );
        };

        info!("Connecting to JMX endpoint '{}' for '{}'", url, descriptor.id());
        let environment = descriptor.transport_environment();

        let handle = match self.connector.connect(&url, &environment).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to connect to '{}': {}", url, e);
                self.metrics.record_connection_attempt(false);
                return descriptor.with_status(ConnectionStatus::Failed, Some(e.to_string()));
            }
        };

        match handle.probe().await {
            Ok(count) => {
                info!(
                    "Connected to '{}' ({}), {} MBeans",
                    descriptor.id(),
                    url,
                    count
                );
                self.metrics.record_connection_attempt(true);
                self.metrics.record_probe(true);
                descriptor.with_connection(handle, count)
            }
            Err(e) => {
                error!("Connected to '{}' but probe failed: {}", url, e);
                self.metrics.record_connection_attempt(false);
                self.metrics.record_probe(false);
                if let Err(close_err) = handle.close().await {
                    debug!("Error closing failed connection to '{}': {}", url, close_err);
                }
                descriptor.with_status(ConnectionStatus::Failed, Some(e.to_string()))
            }
        }
    }

    /// Connect the registered descriptor `id` and make it active.
    ///
    /// Returns the stored descriptor, which may be FAILED. Unknown ids are
    /// `ConnectionNotFound`.
    pub async fn connect(&self, id: &str) -> JmxResult<ConnectionDescriptor> {
        let existing = self
            .registry
            .get(id)
            .ok_or_else(|| JmxError::ConnectionNotFound(id.to_string()))?;

        if existing.kind() == ConnectionKind::Local {
            warn!("Refusing LOCAL connection '{}'", id);
            let failed = existing.with_status(ConnectionStatus::Failed, Some(LOCAL_REJECTED.to_string()));
            self.registry.update(failed.clone());
            return Ok(failed);
        }

        if let Some(previous) = existing.handle() {
            close_quietly(id, previous).await;
        }
        let pending = existing.with_status(ConnectionStatus::Connecting, None);
        self.registry.update(pending.clone());

        let built = self.build_remote(pending).await;
        if !self.registry.has(id) {
            // Removed while dialing
            if let Some(handle) = built.handle() {
                close_quietly(id, handle).await;
            }
            return Err(JmxError::ConnectionNotFound(id.to_string()));
        }

        self.registry.update(built.clone());
        self.registry.set_active(id);
        Ok(built)
    }

    /// Alias of [`Self::connect`], for tool-facing callers.
    pub async fn switch_connection(&self, id: &str) -> JmxResult<ConnectionDescriptor> {
        self.connect(id).await
    }

    /// Re-probe the active connection. A failed probe demotes it to FAILED.
    ///
    /// The outcome is written back only if the probed handle is still the
    /// one installed; a disconnect or reconnect during the probe wins.
    pub async fn is_connected(&self) -> bool {
        let Some(active) = self.registry.active() else {
            return false;
        };
        let Some(handle) = active.handle().cloned() else {
            return false;
        };
        if !active.is_connected() {
            return false;
        }
        let id = active.id().to_string();

        match handle.probe().await {
            Ok(count) => {
                self.metrics.record_probe(true);
                let mut refreshed = active;
                refreshed.mark_checked(count);
                if self
                    .registry
                    .update_if(refreshed, |current| holds_handle(current, &handle))
                {
                    return true;
                }
                debug!("JMX connection '{}' changed during liveness probe", id);
                self.registry.get(&id).is_some_and(|d| d.is_connected())
            }
            Err(e) => {
                warn!("JMX connection '{}' failed liveness probe: {}", id, e);
                self.metrics.record_probe(false);
                let failed = active.with_status(ConnectionStatus::Failed, Some(e.to_string()));
                if self
                    .registry
                    .update_if(failed, |current| holds_handle(current, &handle))
                {
                    close_quietly(&id, &handle).await;
                }
                false
            }
        }
    }

    /// The active live handle.
    pub fn connection(&self) -> JmxResult<LiveConnection> {
        let active = self.registry.active().ok_or(JmxError::NoActiveConnection)?;
        if !active.is_connected() {
            return Err(JmxError::NotConnected);
        }
        active.handle().cloned().ok_or(JmxError::NotConnected)
    }

    /// Connect the active id again.
    pub async fn reconnect(&self) -> JmxResult<ConnectionDescriptor> {
        let id = self
            .registry
            .active_id()
            .ok_or(JmxError::NoActiveConnection)?;
        info!("Reconnecting JMX connection '{}'", id);
        self.connect(&id).await
    }

    /// Disconnect the active connection, if any.
    pub async fn disconnect(&self) -> bool {
        match self.registry.active_id() {
            Some(id) => self.disconnect_id(&id).await,
            None => false,
        }
    }

    /// Close `id`'s handle and mark it DISCONNECTED. Returns false for unknown ids.
    pub async fn disconnect_id(&self, id: &str) -> bool {
        let Some(descriptor) = self.registry.get(id) else {
            return false;
        };
        if let Some(handle) = descriptor.handle() {
            close_quietly(id, handle).await;
        }
        self.registry
            .update(descriptor.with_status(ConnectionStatus::Disconnected, None));
        info!("Disconnected JMX connection: {}", id);
        true
    }

    /// Register a DISCONNECTED descriptor. Returns false if the id is taken.
    pub fn add_connection(&self, config: &ConnectionConfig) -> bool {
        if config.id.trim().is_empty() {
            warn!("Refusing connection with blank id");
            return false;
        }
        let added = self
            .registry
            .add_if_absent(ConnectionDescriptor::from_config(config));
        if !added {
            warn!("Connection already exists: {}", config.id);
        }
        added
    }

    pub async fn remove_connection(&self, id: &str) -> bool {
        self.registry.remove(id).await
    }

    pub fn list_connections(&self) -> Vec<ConnectionDescriptor> {
        self.registry.all()
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.registry.active().as_ref().map(ConnectionInfo::from)
    }

    /// Register configured connections and connect the default one.
    ///
    /// Connection failures are logged; the subsystem starts regardless.
    pub async fn initialize(&self, config: &JmxConfig) {
        let legacy = &config.connection;
        let legacy_url = legacy.url.as_deref().filter(|u| !u.trim().is_empty());
        if let (ConnectionKind::Remote, Some(url)) = (legacy.kind, legacy_url) {
            let mut descriptor =
                ConnectionDescriptor::remote(DEFAULT_CONNECTION_ID, DEFAULT_CONNECTION_NAME, url)
                    .with_credentials(legacy.username.clone(), legacy.password.clone())
                    .with_property(
                        REQUEST_TIMEOUT_KEY,
                        legacy.timeout_secs.saturating_mul(1000).to_string(),
                    );
            // Explicit properties override the derived timeout
            for (k, v) in &legacy.properties {
                descriptor = descriptor.with_property(k, v);
            }
            self.registry.add_if_absent(descriptor);
        }

        for conn in &config.connections {
            self.add_connection(conn);
        }

        let default_id = config
            .connections
            .iter()
            .find(|c| c.default_connection)
            .map(|c| c.id.clone())
            .or_else(|| {
                self.registry
                    .has(DEFAULT_CONNECTION_ID)
                    .then(|| DEFAULT_CONNECTION_ID.to_string())
            });

        match default_id {
            Some(id) => match self.connect(&id).await {
                Ok(d) if d.is_connected() => info!("Default JMX connection '{}' ready", id),
                Ok(d) => warn!(
                    "Default JMX connection '{}' unavailable: {}",
                    id,
                    d.error().unwrap_or("unknown error")
                ),
                Err(e) => warn!("Default JMX connection '{}' not connected: {}", id, e),
            },
            None => debug!("No default JMX connection configured"),
        }
    }

    /// Close every connection.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
    }
}

fn holds_handle(descriptor: &ConnectionDescriptor, handle: &LiveConnection) -> bool {
    descriptor.handle().is_some_and(|h| Arc::ptr_eq(h, handle))
}

async fn close_quietly(id: &str, handle: &LiveConnection) {
    if let Err(e) = handle.close().await {
        debug!("Error closing JMX connection '{}': {}", id, e);
    }
}
