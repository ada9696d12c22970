//! Contract with the management technology.
//!
//! The bridge never speaks the MBean server protocol itself. A [`Connector`]
//! dials an endpoint and hands back a [`ManagementConnection`]; everything the
//! registry, catalog and cache need goes through these two traits.

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{catalog::ManagedEntity, error::JmxResult, identity::ObjectIdentity};

/// Environment key under which a transport expects `[username, password]`.
pub const CREDENTIALS_KEY: &str = "jmx.remote.credentials";

/// Per-request timeout hint (milliseconds) understood by RMI-style transports.
pub const REQUEST_TIMEOUT_KEY: &str = "jmx.remote.x.request.waiting.timeout";

/// A live connection to one MBean server.
///
/// Calls are single-shot; implementations must not retry internally.
#[async_trait]
pub trait ManagementConnection: Send + Sync {
    async fn list_identities(&self) -> JmxResult<Vec<ObjectIdentity>>;

    async fn describe(&self, identity: &ObjectIdentity) -> JmxResult<ManagedEntity>;

    async fn read_attribute(&self, identity: &ObjectIdentity, attribute: &str) -> JmxResult<Value>;

    async fn write_attribute(
        &self,
        identity: &ObjectIdentity,
        attribute: &str,
        value: Value,
    ) -> JmxResult<()>;

    /// Invoke an operation. `signature` holds the parameter type tags in order.
    async fn invoke(
        &self,
        identity: &ObjectIdentity,
        operation: &str,
        args: Vec<Value>,
        signature: &[String],
    ) -> JmxResult<Value>;

    /// Liveness check: the number of MBeans registered on the server.
    async fn probe(&self) -> JmxResult<u64>;

    async fn close(&self) -> JmxResult<()>;
}

pub type LiveConnection = Arc<dyn ManagementConnection>;

/// Opens connections to endpoint addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        environment: &TransportEnvironment,
    ) -> JmxResult<LiveConnection>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Encoded the way the transport expects under [`CREDENTIALS_KEY`].
    pub fn as_pair(&self) -> [&str; 2] {
        [&self.username, &self.password]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Properties and credentials handed to a [`Connector`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportEnvironment {
    pub properties: BTreeMap<String, String>,
    pub credentials: Option<Credentials>,
}

impl TransportEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            credentials: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Attach credentials. A blank username means anonymous access and is ignored.
    #[must_use]
    pub fn with_credentials(mut self, username: Option<&str>, password: Option<&str>) -> Self {
        if let Some(username) = username.filter(|u| !u.trim().is_empty()) {
            self.credentials = Some(Credentials {
                username: username.to_string(),
                password: password.unwrap_or_default().to_string(),
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_only_with_username() {
        let env = TransportEnvironment::new().with_credentials(Some("  "), Some("pw"));
        assert!(env.credentials.is_none());

        let env = TransportEnvironment::new().with_credentials(None, Some("pw"));
        assert!(env.credentials.is_none());

        let env = TransportEnvironment::new().with_credentials(Some("admin"), None);
        let creds = env.credentials.unwrap();
        assert_eq!(creds.as_pair(), ["admin", ""]);
    }

    #[test]
    fn test_properties_merge_with_credentials() {
        let env = TransportEnvironment::from_properties([("a", "1")])
            .with_property(REQUEST_TIMEOUT_KEY, "3000")
            .with_credentials(Some("admin"), Some("secret"));
        assert_eq!(env.properties.len(), 2);
        assert_eq!(env.properties[REQUEST_TIMEOUT_KEY], "3000");
        assert_eq!(env.credentials.unwrap().password, "secret");
    }

    #[test]
    fn test_credentials_debug_masks_password() {
        let creds = Credentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
