//! Bridge configuration types.
//!
//! Loaded from YAML. Every section has serde defaults, so an empty document
//! yields a working configuration. [`JmxConfig::validate`] rejects malformed
//! static configuration before any component is built.

use std::{collections::HashMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    catalog::GlobPattern,
    error::{JmxError, JmxResult},
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JmxConfig {
    /// Single default connection (legacy form, registered as id `default`)
    #[serde(default)]
    pub connection: DefaultConnectionConfig,

    /// Named connections registered at startup
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,

    /// MBean catalog filtering and refresh
    #[serde(default)]
    pub discovery: CatalogConfig,

    /// Port scan and local process discovery
    #[serde(default)]
    pub service_discovery: ServiceDiscoveryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub resources: ResourcesConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// How a connection reaches its MBean server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionKind {
    /// In-process access. Rejected at connect time; local processes are reached
    /// through discovery-produced remote endpoints instead.
    #[default]
    Local,
    Remote,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Local => "LOCAL",
            ConnectionKind::Remote => "REMOTE",
        }
    }
}

impl std::str::FromStr for ConnectionKind {
    type Err = JmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(ConnectionKind::Local),
            "REMOTE" => Ok(ConnectionKind::Remote),
            other => Err(JmxError::Config(format!(
                "Invalid connection type: {}. Must be LOCAL or REMOTE.",
                other
            ))),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct DefaultConnectionConfig {
    #[serde(default, rename = "type")]
    pub kind: ConnectionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout (seconds), handed to the transport as
    /// `jmx.remote.x.request.waiting.timeout` unless `properties` sets it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

/// A named connection entry.
#[derive(Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConnectionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,

    /// Connect to this entry at startup and make it active
    #[serde(default)]
    pub default_connection: bool,
}

impl ConnectionConfig {
    pub fn remote(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ConnectionKind::Remote,
            url: Some(url.into()),
            username: None,
            password: None,
            properties: HashMap::new(),
            default_connection: false,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default_connection = true;
        self
    }
}

impl fmt::Debug for DefaultConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultConnectionConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("timeout_secs", &self.timeout_secs)
            .field("properties", &format!("{} properties", self.properties.len()))
            .finish()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("properties", &format!("{} properties", self.properties.len()))
            .field("default_connection", &self.default_connection)
            .finish()
    }
}

/// MBean catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Object name globs (`*`, `?`) an MBean must match to be cataloged
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Object name globs that always drop an MBean (checked first)
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Periodic catalog refresh interval (seconds)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Run a catalog refresh once the subsystem is up
    #[serde(default = "default_true")]
    pub discover_on_startup: bool,
}

impl CatalogConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Include patterns, falling back to match-everything when none are set.
    pub fn effective_include(&self) -> Vec<String> {
        if self.include.is_empty() {
            default_include()
        } else {
            self.include.clone()
        }
    }
}

/// Port scan and local process discovery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Register discovered services at startup
    #[serde(default = "default_true")]
    pub auto_register: bool,

    #[serde(default = "default_scan_ports")]
    pub scan_ports: Vec<u16>,

    /// Substrings of process display names to skip
    #[serde(default)]
    pub exclude_processes: Vec<String>,

    #[serde(default = "default_scan_host")]
    pub host: String,

    /// Endpoint for a scanned port; `{host}` and `{port}` are substituted
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,

    /// Upper bound for one probe (milliseconds); slower targets count as absent
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Per-request timeout handed to the transport during probes (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

impl ServiceDiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn endpoint_for(&self, host: &str, port: u16) -> String {
        self.endpoint_template
            .replace("{host}", host)
            .replace("{port}", &port.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tool_prefix")]
    pub prefix: String,

    /// Operations with more parameters are not exposed as tools
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,

    #[serde(default)]
    pub exclude_operations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    #[serde(default = "default_true")]
    pub include_read_only: bool,

    #[serde(default)]
    pub include_write_only: bool,

    #[serde(default)]
    pub exclude_attributes: Vec<String>,

    /// Attribute value cache TTL (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Sweep expired cache entries every N inserts
    #[serde(default = "default_cleanup_every")]
    pub cleanup_every: u64,
}

impl ResourcesConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub validate_parameters: bool,

    /// Operation name fragments that are logged as dangerous
    #[serde(default = "default_dangerous_operations")]
    pub dangerous_operations: Vec<String>,

    /// Refuse dangerous operations instead of only logging them
    #[serde(default)]
    pub deny_dangerous_operations: bool,

    /// Domains whose access is flagged
    #[serde(default = "default_sensitive_domains")]
    pub sensitive_domains: Vec<String>,

    #[serde(default = "default_true")]
    pub log_operations: bool,

    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_include() -> Vec<String> {
    vec!["*:*".to_string()]
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_scan_ports() -> Vec<u16> {
    vec![9999, 9010, 8999, 7199, 1099]
}

fn default_scan_host() -> String {
    "localhost".to_string()
}

fn default_endpoint_template() -> String {
    "service:jmx:rmi:///jndi/rmi://{host}:{port}/jmxrmi".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_max_concurrent_probes() -> usize {
    5
}

fn default_tool_prefix() -> String {
    "jmx".to_string()
}

fn default_max_parameters() -> usize {
    10
}

fn default_base_uri() -> String {
    "jmx://".to_string()
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_cleanup_every() -> u64 {
    100
}

fn default_dangerous_operations() -> Vec<String> {
    ["shutdown", "restart", "stop", "destroy"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sensitive_domains() -> Vec<String> {
    ["java.lang", "java.util.logging", "com.sun.management"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_audit_capacity() -> usize {
    1000
}

// Default implementations
impl Default for DefaultConnectionConfig {
    fn default() -> Self {
        Self {
            kind: ConnectionKind::Local,
            url: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            properties: HashMap::new(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
            refresh_interval_secs: default_refresh_interval(),
            discover_on_startup: true,
        }
    }
}

impl Default for ServiceDiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_register: true,
            scan_ports: default_scan_ports(),
            exclude_processes: Vec::new(),
            host: default_scan_host(),
            endpoint_template: default_endpoint_template(),
            probe_timeout_ms: default_probe_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_tool_prefix(),
            max_parameters: default_max_parameters(),
            exclude_operations: Vec::new(),
        }
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_uri: default_base_uri(),
            include_read_only: true,
            include_write_only: false,
            exclude_attributes: Vec::new(),
            cache_ttl_secs: default_cache_ttl(),
            cleanup_every: default_cleanup_every(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            validate_parameters: true,
            dangerous_operations: default_dangerous_operations(),
            deny_dangerous_operations: false,
            sensitive_domains: default_sensitive_domains(),
            log_operations: true,
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl JmxConfig {
    /// Load configuration from a YAML file
    pub async fn from_file(path: &str) -> JmxResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> JmxResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override the default connection from `JMX_URL`, `JMX_USERNAME` and
    /// `JMX_PASSWORD`. A URL from the environment makes the connection REMOTE.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("JMX_URL") {
            if !url.trim().is_empty() {
                self.connection.kind = ConnectionKind::Remote;
                self.connection.url = Some(url);
            }
        }
        if let Ok(username) = std::env::var("JMX_USERNAME") {
            self.connection.username = Some(username);
        }
        if let Ok(password) = std::env::var("JMX_PASSWORD") {
            self.connection.password = Some(password);
        }
        self
    }

    /// Reject configuration the subsystem cannot start with.
    pub fn validate(&self) -> JmxResult<()> {
        let mut seen = std::collections::HashSet::new();
        let mut defaults = 0;
        for conn in &self.connections {
            if conn.id.trim().is_empty() {
                return Err(JmxError::Config("connection id must not be blank".into()));
            }
            if !seen.insert(conn.id.as_str()) {
                return Err(JmxError::Config(format!(
                    "duplicate connection id '{}'",
                    conn.id
                )));
            }
            if conn.kind == ConnectionKind::Remote
                && conn.url.as_deref().map_or(true, |u| u.trim().is_empty())
            {
                return Err(JmxError::Config(format!(
                    "REMOTE connection '{}' requires a url",
                    conn.id
                )));
            }
            if conn.default_connection {
                defaults += 1;
            }
        }
        if defaults > 1 {
            return Err(JmxError::Config(
                "at most one connection may set default_connection".into(),
            ));
        }

        for pattern in self.discovery.include.iter().chain(&self.discovery.exclude) {
            GlobPattern::compile(pattern)?;
        }
        if self.discovery.refresh_interval_secs == 0 {
            return Err(JmxError::Config(
                "discovery.refresh_interval_secs must be positive".into(),
            ));
        }
        if self.resources.cache_ttl_secs == 0 {
            return Err(JmxError::Config(
                "resources.cache_ttl_secs must be positive".into(),
            ));
        }
        if self.resources.base_uri.trim().is_empty() {
            return Err(JmxError::Config("resources.base_uri must not be blank".into()));
        }
        if self.tools.prefix.trim().is_empty() {
            return Err(JmxError::Config("tools.prefix must not be blank".into()));
        }
        if self.service_discovery.probe_timeout_ms == 0
            || self.service_discovery.max_concurrent_probes == 0
        {
            return Err(JmxError::Config(
                "service_discovery probe timeout and concurrency must be positive".into(),
            ));
        }
        Ok(())
    }
}
