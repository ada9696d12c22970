//! Guarded operations exposed to the tool transport.
//!
//! Every externally supplied object name, operation and argument payload is
//! checked by the [`SecurityValidator`] before anything reaches the upstream
//! connection. Attribute writes and operation invocations are recorded in the
//! audit log when `security.log_operations` is on.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use jmx_core::{
    catalog::{spawn_periodic_refresh, ManagedEntity, OperationDescriptor, RefreshOutcome},
    core::{ConnectionConfig, ConnectionInfo, JmxConfig},
    discovery::{DiscoveryResult, DiscoveryService, ProcessAttacher},
    mapper::{schema::parameter_name, ResourceDefinition, ToolDefinition, RESOURCE_MIME_TYPE},
    security::OperationAuditLog,
    CacheStats, CatalogStats, ConnectionKind, ConnectionManager, ConnectionRegistry, Connector,
    JmxError, JmxMetrics, JmxResult, MBeanCatalog, MetricsSnapshot, ObjectIdentity,
    OperationOutcome, ResourceCache, ResourceChangeListener, ResourceMapper, SecurityValidator,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::convert::{coerce_argument, value_from_text};

/// One row of an MBean listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MBeanSummary {
    pub object_name: String,
    pub class_name: String,
    pub description: String,
    pub attributes: usize,
    pub operations: usize,
}

impl From<&ManagedEntity> for MBeanSummary {
    fn from(entity: &ManagedEntity) -> Self {
        Self {
            object_name: entity.identity.to_string(),
            class_name: entity.class_name.clone(),
            description: entity.description.clone(),
            attributes: entity.attributes.len(),
            operations: entity.operations.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub object_name: String,
    pub attribute: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

/// Contents of one resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    /// JSON document `{objectName, attribute, value, timestamp}`
    pub text: String,
}

pub struct JmxService {
    config: JmxConfig,
    manager: Arc<ConnectionManager>,
    discovery: DiscoveryService,
    catalog: Arc<MBeanCatalog>,
    mapper: Arc<ResourceMapper>,
    cache: Arc<ResourceCache>,
    validator: SecurityValidator,
    audit: OperationAuditLog,
    /// Resource addresses published after the last refresh
    known_resources: Mutex<HashSet<String>>,
}

impl JmxService {
    /// Build every component. Nothing is connected yet.
    pub fn new(
        config: JmxConfig,
        connector: Arc<dyn Connector>,
        attacher: Arc<dyn ProcessAttacher>,
    ) -> JmxResult<Self> {
        let metrics = Arc::new(JmxMetrics::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = Arc::new(
            ConnectionManager::new(registry.clone(), connector.clone())
                .with_metrics(metrics.clone()),
        );
        let discovery = DiscoveryService::new(
            registry,
            connector,
            attacher,
            config.service_discovery.clone(),
        )
        .with_metrics(metrics);
        let catalog = Arc::new(MBeanCatalog::new(manager.clone(), &config.discovery)?);
        let mapper = Arc::new(ResourceMapper::new(
            catalog.clone(),
            &config.resources,
            &config.tools,
        )?);
        let cache = Arc::new(ResourceCache::new(
            catalog.clone(),
            manager.clone(),
            mapper.clone(),
            &config.resources,
        ));

        Ok(Self {
            validator: SecurityValidator::new(&config.security),
            audit: OperationAuditLog::with_capacity(config.security.audit_capacity),
            config,
            manager,
            discovery,
            catalog,
            mapper,
            cache,
            known_resources: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &JmxConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn catalog(&self) -> &Arc<MBeanCatalog> {
        &self.catalog
    }

    pub fn mapper(&self) -> &Arc<ResourceMapper> {
        &self.mapper
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn validator(&self) -> &SecurityValidator {
        &self.validator
    }

    pub fn audit_log(&self) -> &OperationAuditLog {
        &self.audit
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.manager.metrics().snapshot()
    }

    pub fn catalog_stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn add_listener(&self, listener: Arc<dyn ResourceChangeListener>) {
        self.cache.add_listener(listener);
    }

    fn checked_identity(&self, object_name: &str) -> JmxResult<ObjectIdentity> {
        self.validator.validate_identity(object_name).into_result()?;
        ObjectIdentity::parse(object_name)
    }

    fn record(&self, identity: &ObjectIdentity, operation: &str, outcome: OperationOutcome) {
        if self.config.security.log_operations {
            info!(
                "JMX operation {} on {}: {:?}",
                operation, identity, outcome
            );
            self.audit
                .record_operation(&identity.to_string(), operation, outcome);
        }
    }

    // MBean queries

    /// Cataloged MBeans, optionally limited to one domain, ordered by name.
    pub fn list_mbeans(&self, domain: Option<&str>) -> Vec<MBeanSummary> {
        let entities = match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => self.catalog.by_domain(domain),
            None => self.catalog.all(),
        };
        let mut summaries: Vec<MBeanSummary> =
            entities.iter().map(|e| MBeanSummary::from(e.as_ref())).collect();
        summaries.sort_by(|a, b| a.object_name.cmp(&b.object_name));
        summaries
    }

    pub fn mbean_info(&self, object_name: &str) -> JmxResult<Arc<ManagedEntity>> {
        let identity = self.checked_identity(object_name)?;
        self.catalog
            .get(&identity)
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))
    }

    pub fn list_domains(&self) -> Vec<String> {
        self.catalog.domains()
    }

    // Attributes

    /// Live read, bypassing the cache and the catalog.
    pub async fn get_attribute(
        &self,
        object_name: &str,
        attribute: &str,
    ) -> JmxResult<AttributeValue> {
        let identity = self.checked_identity(object_name)?;
        let connection = self.manager.connection()?;
        let value = connection.read_attribute(&identity, attribute).await?;
        Ok(AttributeValue {
            object_name: identity.to_string(),
            attribute: attribute.to_string(),
            value,
            timestamp: Utc::now(),
        })
    }

    /// Convert `value` by the attribute's type and write it.
    pub async fn set_attribute(
        &self,
        object_name: &str,
        attribute: &str,
        value: &str,
    ) -> JmxResult<()> {
        let identity = self.checked_identity(object_name)?;
        let operation = format!("setAttribute({})", attribute);

        let result = self.write_attribute(&identity, attribute, value).await;
        self.record(&identity, &operation, outcome_of(&result));
        result
    }

    async fn write_attribute(
        &self,
        identity: &ObjectIdentity,
        attribute: &str,
        value: &str,
    ) -> JmxResult<()> {
        if self.config.security.validate_parameters {
            self.validator
                .validate_argument_value(&Value::String(value.to_string()))
                .into_result()?;
        }
        let connection = self.manager.connection()?;

        let entity = self
            .catalog
            .get(identity)
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))?;
        let descriptor = entity
            .attribute(attribute)
            .ok_or_else(|| JmxError::AttributeNotFound {
                identity: identity.to_string(),
                attribute: attribute.to_string(),
            })?;
        if !descriptor.writable {
            return Err(JmxError::AttributeNotWritable {
                identity: identity.to_string(),
                attribute: attribute.to_string(),
            });
        }

        let converted = value_from_text(value, &descriptor.type_name)?;
        connection
            .write_attribute(identity, attribute, converted)
            .await?;
        self.cache.invalidate(identity, attribute);
        info!("Set attribute {}.{} to '{}'", identity, attribute, value);
        Ok(())
    }

    // Resources

    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        self.mapper.resource_definitions()
    }

    /// Read a resource through the cache.
    pub async fn read_resource(&self, uri: &str) -> JmxResult<ResourceContents> {
        let resolved = self.mapper.from_address(uri)?;
        let identity = &resolved.entity.identity;
        self.validator
            .validate_object_identity(identity)
            .into_result()?;

        let value = self.cache.read(identity, &resolved.attribute.name).await?;
        let document = json!({
            "objectName": identity.to_string(),
            "attribute": resolved.attribute.name,
            "value": value,
            "timestamp": Utc::now(),
        });

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: RESOURCE_MIME_TYPE.to_string(),
            text: serde_json::to_string_pretty(&document)?,
        })
    }

    // Tools

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.mapper.tool_definitions()
    }

    /// Invoke the operation behind a published tool name.
    pub async fn invoke_tool(&self, tool_name: &str, arguments: &str) -> JmxResult<Value> {
        let resolved = self.mapper.from_tool_name(tool_name)?;
        self.invoke_resolved(&resolved.entity, &resolved.operation, arguments)
            .await
    }

    /// Invoke an operation by object name. Overloads resolve to the first
    /// cataloged operation with that name.
    pub async fn invoke_operation(
        &self,
        object_name: &str,
        operation: &str,
        arguments: &str,
    ) -> JmxResult<Value> {
        let identity = self.checked_identity(object_name)?;
        let entity = self
            .catalog
            .get(&identity)
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))?;
        let descriptor = entity
            .operation(operation)
            .cloned()
            .ok_or_else(|| JmxError::OperationNotFound {
                identity: identity.to_string(),
                operation: operation.to_string(),
            })?;
        self.invoke_resolved(&entity, &descriptor, arguments).await
    }

    async fn invoke_resolved(
        &self,
        entity: &ManagedEntity,
        operation: &OperationDescriptor,
        arguments: &str,
    ) -> JmxResult<Value> {
        let identity = &entity.identity;
        let result = self.invoke_checked(identity, operation, arguments).await;
        self.record(identity, &operation.name, outcome_of(&result));
        result
    }

    async fn invoke_checked(
        &self,
        identity: &ObjectIdentity,
        operation: &OperationDescriptor,
        arguments: &str,
    ) -> JmxResult<Value> {
        self.validator
            .validate_operation(identity, &operation.name, arguments)
            .into_result()?;
        if self.config.security.deny_dangerous_operations
            && self.validator.is_dangerous_operation(&operation.name)
        {
            return Err(JmxError::OperationDenied(format!(
                "Operation '{}' on {} is classified as dangerous",
                operation.name, identity
            )));
        }

        let args = positional_arguments(operation, arguments)?;
        let connection = self.manager.connection()?;
        debug!(
            "Invoking {}.{} with {} argument(s)",
            identity,
            operation.name,
            args.len()
        );
        connection
            .invoke(identity, &operation.name, args, &operation.signature())
            .await
    }

    // Connections

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.manager.connection_info()
    }

    pub fn list_connections(&self) -> Vec<ConnectionInfo> {
        self.manager
            .list_connections()
            .iter()
            .map(ConnectionInfo::from)
            .collect()
    }

    /// Connect `id`, make it active and rebuild the catalog from it.
    pub async fn switch_connection(&self, id: &str) -> JmxResult<ConnectionInfo> {
        let descriptor = self.manager.switch_connection(id).await?;
        if descriptor.is_connected() {
            if let Err(e) = self.refresh().await {
                warn!("MBean discovery after switching to '{}' failed: {}", id, e);
            }
        } else {
            warn!(
                "Failed to switch to connection '{}': {}",
                id,
                descriptor.error().unwrap_or("unknown error")
            );
        }
        Ok(ConnectionInfo::from(&descriptor))
    }

    /// Register a new DISCONNECTED connection.
    pub fn add_connection(&self, config: &ConnectionConfig) -> JmxResult<()> {
        if config.id.trim().is_empty() {
            return Err(JmxError::InvalidArguments(
                "connection id must not be blank".to_string(),
            ));
        }
        if config.kind == ConnectionKind::Remote
            && config.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(JmxError::InvalidArguments(format!(
                "REMOTE connection '{}' requires a url",
                config.id
            )));
        }
        if !self.manager.add_connection(config) {
            return Err(JmxError::InvalidArguments(format!(
                "Connection already exists: {}",
                config.id
            )));
        }
        Ok(())
    }

    pub async fn remove_connection(&self, id: &str) -> JmxResult<()> {
        if self.manager.remove_connection(id).await {
            Ok(())
        } else {
            Err(JmxError::ConnectionNotFound(id.to_string()))
        }
    }

    // Discovery

    pub async fn discover(&self) -> DiscoveryResult {
        self.discovery.discover().await
    }

    pub async fn auto_register(&self) -> usize {
        self.discovery.auto_register().await
    }

    // Catalog

    /// Refresh the catalog and announce resources that appeared or vanished.
    pub async fn refresh(&self) -> JmxResult<RefreshOutcome> {
        let outcome = self.catalog.refresh().await?;
        if let RefreshOutcome::Refreshed { .. } = outcome {
            let current = self.mapper.resource_addresses();
            let previous = std::mem::replace(&mut *self.known_resources.lock(), current.clone());
            self.cache.notify_resource_set_changed(&previous, &current);
        }
        Ok(outcome)
    }

    /// Refresh every `discovery.refresh_interval_secs` while connected.
    ///
    /// The first scheduled refresh happens one interval after spawning.
    pub fn spawn_background_refresh(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        spawn_periodic_refresh(
            self.manager.clone(),
            self.config.discovery.refresh_interval(),
            shutdown,
            move || {
                let service = service.clone();
                async move { service.refresh().await }
            },
        )
    }

    /// Close every connection.
    pub async fn shutdown(&self) {
        info!("Shutting down JMX service");
        self.manager.shutdown().await;
    }
}

fn outcome_of<T>(result: &JmxResult<T>) -> OperationOutcome {
    match result {
        Ok(_) => OperationOutcome::Succeeded,
        Err(JmxError::Validation(reason)) | Err(JmxError::OperationDenied(reason)) => {
            OperationOutcome::Rejected {
                reason: reason.clone(),
            }
        }
        Err(e) => OperationOutcome::Failed {
            error: e.to_string(),
        },
    }
}

/// Map a JSON payload onto the operation's parameters, in signature order.
///
/// Objects are matched by parameter name (`p{index}` for unnamed ones), arrays
/// by position. A bare scalar is accepted for single-parameter operations.
fn positional_arguments(operation: &OperationDescriptor, payload: &str) -> JmxResult<Vec<Value>> {
    let params = &operation.parameters;
    let payload: Value = if payload.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(payload)
            .map_err(|e| JmxError::InvalidArguments(format!("Invalid JSON arguments: {}", e)))?
    };

    let raw: Vec<Value> = match payload {
        Value::Null if params.is_empty() => Vec::new(),
        Value::Object(mut map) => params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let name = parameter_name(&param.name, index);
                map.remove(&name).ok_or_else(|| {
                    JmxError::InvalidArguments(format!(
                        "Missing argument '{}' for operation '{}'",
                        name, operation.name
                    ))
                })
            })
            .collect::<JmxResult<Vec<_>>>()?,
        Value::Array(items) => {
            if items.len() != params.len() {
                return Err(JmxError::InvalidArguments(format!(
                    "Operation '{}' expects {} argument(s), got {}",
                    operation.name,
                    params.len(),
                    items.len()
                )));
            }
            items
        }
        scalar if params.len() == 1 && !scalar.is_null() => vec![scalar],
        _ => {
            return Err(JmxError::InvalidArguments(format!(
                "Operation '{}' expects {} argument(s)",
                operation.name,
                params.len()
            )))
        }
    };

    raw.into_iter()
        .zip(params)
        .map(|(value, param)| coerce_argument(value, &param.type_name))
        .collect()
}
