//! Fake MBean server wired into a connector, for service-level tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use jmx_core::{
    catalog::{AttributeDescriptor, ManagedEntity, OperationDescriptor, OperationImpact, ParameterDescriptor},
    core::{ConnectionConfig, JmxConfig},
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
    upstream::{Connector, LiveConnection, ManagementConnection, TransportEnvironment},
};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const PRIMARY_URL: &str = "service:jmx:rmi:///jndi/rmi://primary:9999/jmxrmi";
pub const SECONDARY_URL: &str = "service:jmx:rmi:///jndi/rmi://secondary:9999/jmxrmi";

pub fn id(name: &str) -> ObjectIdentity {
    ObjectIdentity::parse(name).unwrap()
}

pub fn memory_entity() -> ManagedEntity {
    ManagedEntity::new(id("java.lang:type=Memory"), "sun.management.MemoryImpl")
        .with_attribute(AttributeDescriptor::new("HeapMemoryUsage", "long"))
        .with_attribute(AttributeDescriptor::read_write("Verbose", "boolean"))
        .with_operation(OperationDescriptor::new("gc", "void").with_impact(OperationImpact::Action))
}

pub fn worker_entity(name: &str) -> ManagedEntity {
    ManagedEntity::new(id(&format!("com.acme:type=Worker,name={}", name)), "com.acme.Worker")
        .with_attribute(AttributeDescriptor::read_write("Size", "int"))
        .with_attribute(AttributeDescriptor::read_write("Label", "java.lang.String"))
        .with_operation(
            OperationDescriptor::new("resize", "int")
                .with_impact(OperationImpact::Action)
                .with_parameter(ParameterDescriptor::new("size", "int"))
                .with_parameter(ParameterDescriptor::new("force", "boolean")),
        )
        .with_operation(OperationDescriptor::new("shutdownWorker", "void"))
}

#[derive(Default)]
pub struct FakeServer {
    entities: Mutex<Vec<ManagedEntity>>,
    values: Mutex<HashMap<(String, String), Value>>,
    invocations: Mutex<Vec<(String, String, Vec<Value>, Vec<String>)>>,
    writes: Mutex<Vec<(String, String, Value)>>,
    reads: AtomicUsize,
}

impl FakeServer {
    pub fn with_entities(entities: impl IntoIterator<Item = ManagedEntity>) -> Arc<Self> {
        let server = Arc::new(Self::default());
        for entity in entities {
            server.add_entity(entity);
        }
        server
    }

    pub fn add_entity(&self, entity: ManagedEntity) {
        self.entities.lock().push(entity);
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

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// `(identity, operation, args, signature)` per call
    pub fn invocations(&self) -> Vec<(String, String, Vec<Value>, Vec<String>)> {
        self.invocations.lock().clone()
    }

    pub fn writes(&self) -> Vec<(String, String, Value)> {
        self.writes.lock().clone()
    }
}

struct FakeConnection {
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
        self.server
            .entities
            .lock()
            .iter()
            .find(|e| &e.identity == identity)
            .cloned()
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))
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
        signature: &[String],
    ) -> JmxResult<Value> {
        self.server.invocations.lock().push((
            identity.to_string(),
            operation.to_string(),
            args.clone(),
            signature.to_vec(),
        ));
        Ok(json!({ "invoked": operation }))
    }

    async fn probe(&self) -> JmxResult<u64> {
        Ok(self.server.entities.lock().len() as u64)
    }

    async fn close(&self) -> JmxResult<()> {
        Ok(())
    }
}

/// Endpoint address to fake server. Unknown endpoints refuse.
#[derive(Default)]
pub struct FakeConnector {
    endpoints: Mutex<HashMap<String, Arc<FakeServer>>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, endpoint: &str, server: Arc<FakeServer>) {
        self.endpoints.lock().insert(endpoint.to_string(), server);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        endpoint: &str,
        _environment: &TransportEnvironment,
    ) -> JmxResult<LiveConnection> {
        let server = self.endpoints.lock().get(endpoint).cloned();
        match server {
            Some(server) => Ok(Arc::new(FakeConnection { server })),
            None => Err(JmxError::ConnectionFailed(format!(
                "Connection refused: {}",
                endpoint
            ))),
        }
    }
}

/// A config with one default connection `primary` and discovery turned off.
pub fn config() -> JmxConfig {
    let mut config = JmxConfig::default();
    config.connections = vec![ConnectionConfig::remote("primary", "Primary", PRIMARY_URL).as_default()];
    config.service_discovery.enabled = false;
    config
}
