//! JMX bridge core.
//!
//! ## Modules
//!
//! - [`core`]: connection infrastructure (config, registry, manager, metrics)
//! - [`discovery`]: port scan and local process discovery
//! - [`catalog`]: filtered MBean metadata snapshots
//! - [`mapper`]: resource address and tool name mapping
//! - [`cache`]: TTL attribute cache with change notifications
//! - [`security`]: input validation and operation audit
//!
//! The management protocol itself is reached through the traits in
//! [`upstream`].

// Shared types
pub mod error;
pub mod identity;
pub mod upstream;

// Subsystems
pub mod cache;
pub mod catalog;
pub mod core;
pub mod discovery;
pub mod mapper;
pub mod security;

pub use cache::{CacheStats, ChangeEvent, ResourceCache, ResourceChangeListener};
pub use catalog::{
    AttributeDescriptor, CatalogStats, MBeanCatalog, ManagedEntity, OperationDescriptor,
    OperationImpact, ParameterDescriptor, RefreshOutcome,
};
pub use core::{
    ConnectionConfig, ConnectionDescriptor, ConnectionInfo, ConnectionKind, ConnectionManager,
    ConnectionRegistry, ConnectionStatus, JmxConfig, JmxMetrics, MetricsSnapshot,
};
pub use discovery::{DiscoveryResult, DiscoveryService, NoAttach, ProcessAttacher};
pub use error::{JmxError, JmxResult};
pub use identity::ObjectIdentity;
pub use mapper::{ResourceDefinition, ResourceMapper, ToolDefinition};
pub use security::{OperationAuditLog, OperationOutcome, SecurityValidator, ValidationResult};
pub use upstream::{Connector, LiveConnection, ManagementConnection, TransportEnvironment};
