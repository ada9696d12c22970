//! Connection descriptors.
//!
//! A descriptor carries a live handle only while its status is CONNECTED.
//! State changes go through [`ConnectionDescriptor::with_connection`] and
//! [`ConnectionDescriptor::with_status`], which keep that invariant.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::{ConnectionConfig, ConnectionKind};
use crate::upstream::{LiveConnection, TransportEnvironment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Connecting,
    Failed,
    Unknown,
}

impl ConnectionStatus {
    /// Upper-case wire name, as shown to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Failed => "FAILED",
            ConnectionStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Serialize)]
pub struct ConnectionDescriptor {
    id: String,
    name: String,
    kind: ConnectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip)]
    password: Option<String>,
    properties: BTreeMap<String, String>,
    status: ConnectionStatus,
    connected_at: Option<DateTime<Utc>>,
    last_checked: Option<DateTime<Utc>>,
    mbean_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    handle: Option<LiveConnection>,
}

impl ConnectionDescriptor {
    /// A LOCAL descriptor. Connecting it always fails.
    pub fn local(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ConnectionKind::Local,
            url: None,
            username: None,
            password: None,
            properties: BTreeMap::new(),
            status: ConnectionStatus::Disconnected,
            connected_at: None,
            last_checked: None,
            mbean_count: None,
            error: None,
            handle: None,
        }
    }

    /// A DISCONNECTED REMOTE descriptor for `url`.
    pub fn remote(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ConnectionKind::Remote,
            url: Some(url.into()),
            ..Self::local(id, name)
        }
    }

    /// A DISCONNECTED descriptor from a configured connection entry.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        let mut descriptor = Self::local(&config.id, &config.name);
        descriptor.kind = config.kind;
        if config.kind == ConnectionKind::Remote {
            descriptor.url = config.url.clone();
        }
        descriptor.username = config.username.clone();
        descriptor.password = config.password.clone();
        descriptor.properties = config
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        descriptor
    }

    /// Set credentials. They reach the transport only with a non-blank username.
    #[must_use]
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Add a transport environment property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Record a successful connection.
    #[must_use]
    pub fn with_connection(mut self, handle: LiveConnection, mbean_count: u64) -> Self {
        let now = Utc::now();
        self.status = ConnectionStatus::Connected;
        self.connected_at = Some(now);
        self.last_checked = Some(now);
        self.mbean_count = Some(mbean_count);
        self.error = None;
        self.handle = Some(handle);
        self
    }

    /// Move to `status`. Leaving CONNECTED drops the handle and the MBean count;
    /// the caller is responsible for closing the handle beforehand.
    #[must_use]
    pub fn with_status(mut self, status: ConnectionStatus, error: Option<String>) -> Self {
        self.status = status;
        self.last_checked = Some(Utc::now());
        self.error = error;
        if status != ConnectionStatus::Connected {
            self.handle = None;
            self.mbean_count = None;
        }
        self
    }

    /// MBean count observed by a probe that did not keep the connection open.
    #[must_use]
    pub fn with_observed_count(mut self, mbean_count: u64) -> Self {
        self.mbean_count = Some(mbean_count);
        self.last_checked = Some(Utc::now());
        self
    }

    /// Refresh the liveness bookkeeping of a connected descriptor.
    pub(crate) fn mark_checked(&mut self, mbean_count: u64) {
        self.last_checked = Some(Utc::now());
        self.mbean_count = Some(mbean_count);
    }

    /// Unique registry key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// LOCAL or REMOTE.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Service URL of a REMOTE descriptor.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Extra transport environment properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// When the current live handle was established.
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// When the status was last confirmed or changed.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    /// MBean count from the most recent probe.
    pub fn mbean_count(&self) -> Option<u64> {
        self.mbean_count
    }

    /// Reason for the last failure, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The live handle. Present only while CONNECTED.
    pub fn handle(&self) -> Option<&LiveConnection> {
        self.handle.as_ref()
    }

    /// Consume the descriptor, yielding its live handle for closing.
    pub fn into_handle(self) -> Option<LiveConnection> {
        self.handle
    }

    /// CONNECTED with a live handle.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.handle.is_some()
    }

    /// Properties merged with credentials, as handed to the connector.
    pub fn transport_environment(&self) -> TransportEnvironment {
        TransportEnvironment::from_properties(self.properties.clone())
            .with_credentials(self.username.as_deref(), self.password.as_deref())
    }

    /// One-line human readable summary.
    pub fn display_string(&self) -> String {
        let mut out = format!("{} ({}) - {}", self.name, self.id, self.kind.as_str());
        if let Some(url) = &self.url {
            out.push_str(" @ ");
            out.push_str(url);
        }
        out.push_str(&format!(" [{}]", self.status));
        if let Some(count) = self.mbean_count {
            out.push_str(&format!(" - {} MBeans", count));
        }
        out
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("properties", &self.properties)
            .field("status", &self.status)
            .field("connected_at", &self.connected_at)
            .field("last_checked", &self.last_checked)
            .field("mbean_count", &self.mbean_count)
            .field("error", &self.error)
            .field("live", &self.handle.is_some())
            .finish()
    }
}
