//! Discovery of reachable MBean servers.
//!
//! Two strategies run per cycle and are merged:
//! - a port scan of the configured host, and
//! - local process attach through a [`ProcessAttacher`].
//!
//! Only targets that answer a liveness probe are reported. Every probe runs
//! against its own deadline on a bounded number of concurrent tasks, so a
//! stuck target is dropped without holding up the rest. Probe connections are
//! closed and attached processes detached even when the deadline passes. Timeouts and refusals mean
//! "no service here" and are never reported as errors.

use std::{collections::HashSet, sync::Arc};

use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{error::Elapsed, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::attach::{AttachedProcess, ProcessAttacher, ProcessInfo, LOCAL_CONNECTOR_ADDRESS};
use crate::{
    core::{
        config::ServiceDiscoveryConfig, descriptor::ConnectionDescriptor, metrics::JmxMetrics,
        registry::ConnectionRegistry,
    },
    error::JmxResult,
    identity::ObjectIdentity,
    upstream::{Connector, LiveConnection, TransportEnvironment, REQUEST_TIMEOUT_KEY},
};

const NOTIFICATION_FETCH_TIMEOUT_KEY: &str = "jmx.remote.x.notification.fetch.timeout";
const RUNTIME_MBEAN: &str = "java.lang:type=Runtime";
const JAVA_COMMAND_PROPERTY: &str = "sun.java.command";

/// Outcome of one discovery cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    /// Confirmed-live candidates, DISCONNECTED, ordered by id
    pub discovered: Vec<ConnectionDescriptor>,
    /// Failures of whole strategies (not of individual probes)
    pub errors: Vec<String>,
}

pub struct DiscoveryService {
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn Connector>,
    attacher: Arc<dyn ProcessAttacher>,
    config: ServiceDiscoveryConfig,
    metrics: Arc<JmxMetrics>,
    self_pid: u32,
}

impl DiscoveryService {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connector: Arc<dyn Connector>,
        attacher: Arc<dyn ProcessAttacher>,
        config: ServiceDiscoveryConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            attacher,
            config,
            metrics: Arc::new(JmxMetrics::new()),
            self_pid: std::process::id(),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<JmxMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Treat `pid` as the calling process (skipped during attach).
    #[must_use]
    pub fn with_self_pid(mut self, pid: u32) -> Self {
        self.self_pid = pid;
        self
    }

    pub fn config(&self) -> &ServiceDiscoveryConfig {
        &self.config
    }

    /// Run both strategies and merge their candidates.
    pub async fn discover(&self) -> DiscoveryResult {
        if !self.config.enabled {
            debug!("Service discovery disabled");
            return DiscoveryResult::default();
        }

        info!("Starting JMX service discovery...");
        let mut discovered = self.scan_ports().await;
        let mut errors = Vec::new();

        match self.discover_local_processes().await {
            Ok(local) => discovered.extend(local),
            Err(e) => {
                warn!("Local process discovery failed: {}", e);
                errors.push(format!("Local process discovery failed: {}", e));
            }
        }

        let mut seen = HashSet::new();
        discovered.retain(|d| seen.insert(d.id().to_string()));
        discovered.sort_by(|a, b| a.id().cmp(b.id()));

        info!(
            "Discovery completed. Found {} JMX services",
            discovered.len()
        );
        DiscoveryResult { discovered, errors }
    }

    /// Discover and register every candidate not yet in the registry.
    pub async fn auto_register(&self) -> usize {
        let result = self.discover().await;
        let mut registered = 0;
        for descriptor in result.discovered {
            let id = descriptor.id().to_string();
            if self.registry.add_if_absent(descriptor) {
                info!("Auto-registered JMX connection: {}", id);
                registered += 1;
            } else {
                debug!("Connection already registered: {}", id);
            }
        }
        info!("Auto-registered {} new JMX connection(s)", registered);
        registered
    }

    async fn scan_ports(&self) -> Vec<ConnectionDescriptor> {
        let host = self.config.host.as_str();
        info!(
            "Scanning {} JMX port(s) on {}",
            self.config.scan_ports.len(),
            host
        );

        let found: Vec<ConnectionDescriptor> = stream::iter(self.config.scan_ports.iter().copied())
            .map(|port| self.probe_port(host, port))
            .buffer_unordered(self.config.max_concurrent_probes)
            .filter_map(|candidate| async move { candidate })
            .collect()
            .await;

        info!("Port scan completed. Found {} services", found.len());
        found
    }

    async fn probe_port(&self, host: &str, port: u16) -> Option<ConnectionDescriptor> {
        let endpoint = self.config.endpoint_for(host, port);
        let deadline = Instant::now() + self.config.probe_timeout();

        let (count, app_name) = match self.probe_endpoint(&endpoint, deadline, true).await {
            Ok(found) => {
                self.metrics.record_discovery_probe(false);
                found?
            }
            Err(_) => {
                self.metrics.record_discovery_probe(true);
                debug!("Probe of {} timed out", endpoint);
                return None;
            }
        };

        let name = match app_name {
            Some(app) => format!("{} ({}:{})", app, host, port),
            None => format!("Discovered JMX ({}:{})", host, port),
        };
        info!("Discovered JMX service: {} with {} MBeans", name, count);
        Some(
            ConnectionDescriptor::remote(format!("discovered-{}-{}", host, port), name, endpoint)
                .with_observed_count(count),
        )
    }

    async fn discover_local_processes(&self) -> JmxResult<Vec<ConnectionDescriptor>> {
        let processes = self.attacher.list_processes().await?;
        debug!("Found {} local Java processes", processes.len());

        let candidates: Vec<ProcessInfo> = processes
            .into_iter()
            .filter(|p| {
                if p.pid == self.self_pid {
                    debug!("Skipping self (PID: {})", p.pid);
                    return false;
                }
                if let Some(pattern) = self
                    .config
                    .exclude_processes
                    .iter()
                    .find(|pattern| p.display_name.contains(pattern.as_str()))
                {
                    debug!("Skipping excluded process {} ('{}')", p.pid, pattern);
                    return false;
                }
                true
            })
            .collect();

        let found: Vec<ConnectionDescriptor> = stream::iter(candidates)
            .map(|process| self.probe_process(process))
            .buffer_unordered(self.config.max_concurrent_probes)
            .filter_map(|candidate| async move { candidate })
            .collect()
            .await;

        info!(
            "Local process discovery completed. Found {} JMX-enabled processes",
            found.len()
        );
        Ok(found)
    }

    async fn probe_process(&self, process: ProcessInfo) -> Option<ConnectionDescriptor> {
        let deadline = Instant::now() + self.config.probe_timeout();
        match self.attach_and_probe(&process, deadline).await {
            Ok(found) => {
                self.metrics.record_discovery_probe(false);
                found
            }
            Err(_) => {
                self.metrics.record_discovery_probe(true);
                debug!("Attach probe of process {} timed out", process.pid);
                None
            }
        }
    }

    /// `Err` once `deadline` passes. The target is detached either way.
    async fn attach_and_probe(
        &self,
        process: &ProcessInfo,
        deadline: Instant,
    ) -> Result<Option<ConnectionDescriptor>, Elapsed> {
        let pid = process.pid;
        debug!(
            "Attempting to attach to process {} ({})",
            pid, process.display_name
        );
        let mut vm = match timeout_at(deadline, self.attacher.attach(pid)).await? {
            Ok(vm) => vm,
            Err(e) => {
                debug!("Failed to attach to process {}: {}", pid, e);
                return Ok(None);
            }
        };

        let address = timeout_at(deadline, connector_address(vm.as_ref(), pid)).await;
        if let Err(e) = vm.detach().await {
            debug!("Error detaching from process {}: {}", pid, e);
        }

        let Some(address) = address? else {
            debug!("No JMX address available for process {}", pid);
            return Ok(None);
        };

        let Some((count, _)) = self.probe_endpoint(&address, deadline, false).await? else {
            return Ok(None);
        };

        let name = format!(
            "Local Process {} ({})",
            pid,
            simple_main_class(&process.display_name).unwrap_or_else(|| "Unknown".to_string())
        );
        info!(
            "Discovered local JMX process: {} -> {} ({} MBeans)",
            name, address, count
        );
        Ok(Some(
            ConnectionDescriptor::remote(format!("local-{}", pid), name, address)
                .with_observed_count(count),
        ))
    }

    /// Connect, probe and close `endpoint` before `deadline`, optionally
    /// reading the application name too. A connection that was opened is
    /// closed even when the deadline passes mid-probe.
    async fn probe_endpoint(
        &self,
        endpoint: &str,
        deadline: Instant,
        named: bool,
    ) -> Result<Option<(u64, Option<String>)>, Elapsed> {
        let Some(conn) = timeout_at(deadline, self.open(endpoint)).await? else {
            return Ok(None);
        };

        let probed = timeout_at(deadline, async {
            match probe_count(&conn, endpoint).await {
                Some(count) if named => Some((count, application_name(&conn).await)),
                Some(count) => Some((count, None)),
                None => None,
            }
        })
        .await;

        close(&conn, endpoint).await;
        probed
    }

    async fn open(&self, endpoint: &str) -> Option<LiveConnection> {
        let timeout = self.config.request_timeout_ms.to_string();
        let environment = TransportEnvironment::new()
            .with_property(REQUEST_TIMEOUT_KEY, timeout.clone())
            .with_property(NOTIFICATION_FETCH_TIMEOUT_KEY, timeout);

        debug!("Testing JMX connection: {}", endpoint);
        match self.connector.connect(endpoint, &environment).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                debug!("No JMX service at {}: {}", endpoint, e);
                None
            }
        }
    }
}

/// The target's local connector address, starting its management agent
/// when none is published yet.
async fn connector_address(vm: &dyn AttachedProcess, pid: u32) -> Option<String> {
    match vm.agent_property(LOCAL_CONNECTOR_ADDRESS).await {
        Ok(Some(address)) => Some(address),
        Ok(None) => {
            debug!("JMX not enabled for process {}, starting management agent", pid);
            match vm.start_local_management_agent().await {
                Ok(()) => vm
                    .agent_property(LOCAL_CONNECTOR_ADDRESS)
                    .await
                    .ok()
                    .flatten(),
                Err(e) => {
                    debug!("Could not start management agent for {}: {}", pid, e);
                    None
                }
            }
        }
        Err(e) => {
            debug!("Could not read agent properties of {}: {}", pid, e);
            None
        }
    }
}

async fn probe_count(conn: &LiveConnection, endpoint: &str) -> Option<u64> {
    match conn.probe().await {
        Ok(count) => Some(count),
        Err(e) => {
            debug!("Probe of {} failed: {}", endpoint, e);
            None
        }
    }
}

async fn close(conn: &LiveConnection, endpoint: &str) {
    if let Err(e) = conn.close().await {
        debug!("Error closing probe connection to {}: {}", endpoint, e);
    }
}

/// Best-effort application name from the target's runtime MBean.
async fn application_name(conn: &LiveConnection) -> Option<String> {
    let runtime = ObjectIdentity::parse(RUNTIME_MBEAN).ok()?;

    if let Ok(Value::String(name)) = conn.read_attribute(&runtime, "Name").await {
        if let Some((pid, _host)) = name.split_once('@') {
            return Some(format!("Java Process {}", pid));
        }
    }

    match conn.read_attribute(&runtime, "SystemProperties").await {
        Ok(props) => system_property(&props, JAVA_COMMAND_PROPERTY)
            .and_then(|command| simple_main_class(&command)),
        Err(e) => {
            debug!("Failed to get application name: {}", e);
            None
        }
    }
}

/// Look up a key in a system properties value, given either as a JSON object
/// or as tabular rows of `{key, value}`.
fn system_property(props: &Value, key: &str) -> Option<String> {
    match props {
        Value::Object(map) => map.get(key).and_then(Value::as_str).map(String::from),
        Value::Array(rows) => rows.iter().find_map(|row| {
            (row.get("key").and_then(Value::as_str) == Some(key))
                .then(|| row.get("value").and_then(Value::as_str).map(String::from))
                .flatten()
        }),
        _ => None,
    }
}

/// Simple class name of the first token of a command line.
pub(crate) fn simple_main_class(command: &str) -> Option<String> {
    let first = command.split_whitespace().next()?;
    let simple = first.rsplit_once('.').map_or(first, |(_, tail)| tail);
    Some(simple.to_string())
}
