//! In-memory upstream used by the integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use jmx_core::{
    catalog::{AttributeDescriptor, ManagedEntity, OperationDescriptor, OperationImpact, ParameterDescriptor},
    core::{ConnectionConfig, ConnectionManager, ConnectionRegistry},
    discovery::{AttachedProcess, ProcessAttacher, ProcessInfo, LOCAL_CONNECTOR_ADDRESS},
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
    upstream::{Connector, LiveConnection, ManagementConnection, TransportEnvironment},
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

pub fn id(name: &str) -> ObjectIdentity {
    ObjectIdentity::parse(name).unwrap()
}

/// `java.lang:type=Memory` with a read-only, a read-write and a write-only
/// attribute plus a `gc` operation.
pub fn memory_entity() -> ManagedEntity {
    ManagedEntity::new(id("java.lang:type=Memory"), "sun.management.MemoryImpl")
        .with_attribute(AttributeDescriptor::new("HeapMemoryUsage", "long"))
        .with_attribute(AttributeDescriptor::read_write("Verbose", "boolean"))
        .with_attribute(AttributeDescriptor::write_only("Secret", "java.lang.String"))
        .with_operation(OperationDescriptor::new("gc", "void").with_impact(OperationImpact::Action))
}

pub fn threading_entity() -> ManagedEntity {
    ManagedEntity::new(id("java.lang:type=Threading"), "sun.management.ThreadImpl")
        .with_attribute(AttributeDescriptor::new("ThreadCount", "int"))
        .with_operation(
            OperationDescriptor::new("getThreadCpuTime", "long")
                .with_impact(OperationImpact::Info)
                .with_parameter(ParameterDescriptor::new("id", "long")),
        )
}

pub fn app_entity(name: &str) -> ManagedEntity {
    ManagedEntity::new(id(&format!("com.acme:type=Worker,name={}", name)), "com.acme.Worker")
        .with_attribute(AttributeDescriptor::read_write("Queue", "java.lang.String"))
        .with_attribute(AttributeDescriptor::read_write("Size", "int"))
        .with_operation(
            OperationDescriptor::new("resize", "int")
                .with_impact(OperationImpact::Action)
                .with_parameter(ParameterDescriptor::new("size", "int"))
                .with_parameter(ParameterDescriptor::new("force", "boolean")),
        )
        .with_operation(OperationDescriptor::new("stopWorker", "void"))
}

/// A fake MBean server. Clones of the `Arc` observe the same state.
#[derive(Default)]
pub struct FakeServer {
    entities: Mutex<Vec<ManagedEntity>>,
    values: Mutex<HashMap<(String, String), Value>>,
    failing_describes: Mutex<HashSet<String>>,
    invocations: Mutex<Vec<(String, String, Vec<Value>)>>,
    writes: Mutex<Vec<(String, String, Value)>>,
    reads: AtomicUsize,
    closes: AtomicUsize,
    probe_fails: AtomicBool,
    probe_gate: Mutex<Option<Arc<Notify>>>,
    gated_probes: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entities(entities: impl IntoIterator<Item = ManagedEntity>) -> Arc<Self> {
        let server = Self::new();
        for entity in entities {
            server.add_entity(entity);
        }
        server
    }

    pub fn add_entity(&self, entity: ManagedEntity) {
        let mut entities = self.entities.lock();
        entities.retain(|e| e.identity != entity.identity);
        entities.push(entity);
    }

    pub fn remove_entity(&self, name: &str) {
        let identity = id(name);
        self.entities.lock().retain(|e| e.identity != identity);
    }

    pub fn set_value(&self, name: &str, attribute: &str, value: Value) {
        self.values
            .lock()
            .insert((id(name).to_string(), attribute.to_string()), value);
    }

    pub fn fail_describe(&self, name: &str) {
        self.failing_describes.lock().insert(id(name).to_string());
    }

    pub fn set_probe_failure(&self, fail: bool) {
        self.probe_fails.store(fail, Ordering::SeqCst);
    }

    /// The next probe waits on the returned gate until it is notified.
    /// Dropping the gate without notifying leaves that probe hanging.
    pub fn gate_probes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.probe_gate.lock() = Some(gate.clone());
        gate
    }

    /// Probes that have reached a gate.
    pub fn gated_probes(&self) -> usize {
        self.gated_probes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<(String, String, Vec<Value>)> {
        self.invocations.lock().clone()
    }

    pub fn writes(&self) -> Vec<(String, String, Value)> {
        self.writes.lock().clone()
    }

    fn find(&self, identity: &ObjectIdentity) -> JmxResult<ManagedEntity> {
        self.entities
            .lock()
            .iter()
            .find(|e| &e.identity == identity)
            .cloned()
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))
    }
}

/// One live handle onto a [`FakeServer`].
pub struct FakeConnection {
    server: Arc<FakeServer>,
}

#[async_trait]
impl ManagementConnection for FakeConnection {
    async fn list_identities(&self) -> JmxResult<Vec<ObjectIdentity>> {
        Ok(self
            .server
            .entities
            .lock()
            .iter()
            .map(|e| e.identity.clone())
            .collect())
    }

    async fn describe(&self, identity: &ObjectIdentity) -> JmxResult<ManagedEntity> {
        if self
            .server
            .failing_describes
            .lock()
            .contains(&identity.to_string())
        {
            return Err(JmxError::Transport("describe failed".to_string()));
        }
        self.server.find(identity)
    }

    async fn read_attribute(&self, identity: &ObjectIdentity, attribute: &str) -> JmxResult<Value> {
        self.server.reads.fetch_add(1, Ordering::SeqCst);
        self.server
            .values
            .lock()
            .get(&(identity.to_string(), attribute.to_string()))
            .cloned()
            .ok_or_else(|| JmxError::AttributeNotFound {
                identity: identity.to_string(),
                attribute: attribute.to_string(),
            })
    }

    async fn write_attribute(
        &self,
        identity: &ObjectIdentity,
        attribute: &str,
        value: Value,
    ) -> JmxResult<()> {
        self.server
            .writes
            .lock()
            .push((identity.to_string(), attribute.to_string(), value.clone()));
        self.server
            .values
            .lock()
            .insert((identity.to_string(), attribute.to_string()), value);
        Ok(())
    }

    async fn invoke(
        &self,
        identity: &ObjectIdentity,
        operation: &str,
        args: Vec<Value>,
        _signature: &[String],
    ) -> JmxResult<Value> {
        self.server
            .invocations
            .lock()
            .push((identity.to_string(), operation.to_string(), args.clone()));
        Ok(json!({ "invoked": operation, "args": args }))
    }

    async fn probe(&self) -> JmxResult<u64> {
        let gate = self.server.probe_gate.lock().take();
        if let Some(gate) = gate {
            self.server.gated_probes.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
        }
        if self.server.probe_fails.load(Ordering::SeqCst) {
            return Err(JmxError::Transport("connection reset".to_string()));
        }
        Ok(self.server.entities.lock().len() as u64)
    }

    async fn close(&self) -> JmxResult<()> {
        self.server.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
enum Endpoint {
    Server(Arc<FakeServer>),
    /// Never answers
    Hang,
}

/// Maps endpoint addresses to fake servers. Unknown endpoints refuse.
#[derive(Default)]
pub struct FakeConnector {
    endpoints: Mutex<HashMap<String, Endpoint>>,
    environments: Mutex<Vec<(String, TransportEnvironment)>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, endpoint: &str, server: Arc<FakeServer>) {
        self.endpoints
            .lock()
            .insert(endpoint.to_string(), Endpoint::Server(server));
    }

    pub fn hang(&self, endpoint: &str) {
        self.endpoints.lock().insert(endpoint.to_string(), Endpoint::Hang);
    }

    pub fn refuse(&self, endpoint: &str) {
        self.endpoints.lock().remove(endpoint);
    }

    pub fn connect_count(&self) -> usize {
        self.environments.lock().len()
    }

    /// Environments passed to `connect`, in call order.
    pub fn environments(&self) -> Vec<(String, TransportEnvironment)> {
        self.environments.lock().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        endpoint: &str,
        environment: &TransportEnvironment,
    ) -> JmxResult<LiveConnection> {
        self.environments
            .lock()
            .push((endpoint.to_string(), environment.clone()));
        let target = self.endpoints.lock().get(endpoint).cloned();
        match target {
            Some(Endpoint::Server(server)) => Ok(Arc::new(FakeConnection { server })),
            Some(Endpoint::Hang) => std::future::pending().await,
            None => Err(JmxError::ConnectionFailed(format!(
                "Connection refused: {}",
                endpoint
            ))),
        }
    }
}

/// Local processes with optional management addresses.
#[derive(Default)]
pub struct FakeAttacher {
    processes: Mutex<Vec<ProcessInfo>>,
    addresses: Mutex<HashMap<u32, String>>,
    /// Address published once the agent is started
    startable: Mutex<HashMap<u32, String>>,
    /// Processes whose agent never answers
    unresponsive: Mutex<HashSet<u32>>,
    detaches: Arc<AtomicUsize>,
    fail_listing: AtomicBool,
}

impl FakeAttacher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_process(&self, pid: u32, display_name: &str, address: Option<&str>) {
        self.processes.lock().push(ProcessInfo::new(pid, display_name));
        if let Some(address) = address {
            self.addresses.lock().insert(pid, address.to_string());
        }
    }

    /// The process publishes `address` only after its agent is started.
    pub fn add_agentless_process(&self, pid: u32, display_name: &str, address: &str) {
        self.processes.lock().push(ProcessInfo::new(pid, display_name));
        self.startable.lock().insert(pid, address.to_string());
    }

    pub fn add_unresponsive_process(&self, pid: u32, display_name: &str) {
        self.processes.lock().push(ProcessInfo::new(pid, display_name));
        self.unresponsive.lock().insert(pid);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

struct FakeAttached {
    address: Mutex<Option<String>>,
    on_start: Option<String>,
    unresponsive: bool,
    detaches: Arc<AtomicUsize>,
}

#[async_trait]
impl AttachedProcess for FakeAttached {
    async fn agent_property(&self, key: &str) -> JmxResult<Option<String>> {
        if self.unresponsive {
            return std::future::pending().await;
        }
        if key != LOCAL_CONNECTOR_ADDRESS {
            return Ok(None);
        }
        Ok(self.address.lock().clone())
    }

    async fn start_local_management_agent(&self) -> JmxResult<()> {
        match &self.on_start {
            Some(address) => {
                *self.address.lock() = Some(address.clone());
                Ok(())
            }
            None => Err(JmxError::ConnectionFailed("agent unavailable".to_string())),
        }
    }

    async fn detach(&mut self) -> JmxResult<()> {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProcessAttacher for FakeAttacher {
    async fn list_processes(&self) -> JmxResult<Vec<ProcessInfo>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(JmxError::Transport("attach API unavailable".to_string()));
        }
        Ok(self.processes.lock().clone())
    }

    async fn attach(&self, pid: u32) -> JmxResult<Box<dyn AttachedProcess>> {
        if !self.processes.lock().iter().any(|p| p.pid == pid) {
            return Err(JmxError::ConnectionFailed(format!("no such process {}", pid)));
        }
        Ok(Box::new(FakeAttached {
            address: Mutex::new(self.addresses.lock().get(&pid).cloned()),
            on_start: self.startable.lock().get(&pid).cloned(),
            unresponsive: self.unresponsive.lock().contains(&pid),
            detaches: self.detaches.clone(),
        }))
    }
}

pub fn manager(connector: Arc<FakeConnector>) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        Arc::new(ConnectionRegistry::new()),
        connector,
    ))
}

pub const TEST_URL: &str = "service:jmx:rmi:///jndi/rmi://fake-host:9999/jmxrmi";

/// A manager whose active connection `test` points at `server`.
pub async fn connected_manager(server: Arc<FakeServer>) -> Arc<ConnectionManager> {
    let connector = FakeConnector::new();
    connector.serve(TEST_URL, server);
    let manager = manager(connector);
    manager.add_connection(&ConnectionConfig::remote("test", "Test", TEST_URL));
    let descriptor = manager.connect("test").await.unwrap();
    assert!(descriptor.is_connected());
    manager
}
