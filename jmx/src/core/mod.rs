//! Connection infrastructure: configuration, descriptors, registry and manager.

pub mod config;
pub mod descriptor;
pub mod manager;
pub mod metrics;
pub mod registry;

pub use config::{
    CatalogConfig, ConnectionConfig, ConnectionKind, DefaultConnectionConfig, JmxConfig,
    ResourcesConfig, SecurityConfig, ServiceDiscoveryConfig, ToolsConfig,
};
pub use descriptor::{ConnectionDescriptor, ConnectionStatus};
pub use manager::{ConnectionInfo, ConnectionManager, DEFAULT_CONNECTION_ID};
pub use metrics::{JmxMetrics, MetricsSnapshot};
pub use registry::ConnectionRegistry;
