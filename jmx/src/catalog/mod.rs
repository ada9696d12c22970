//! MBean catalog: entity metadata, object name patterns and the snapshot index.

pub mod index;
pub mod pattern;
pub mod types;

pub use index::{
    spawn_periodic_refresh, CatalogSnapshot, CatalogStats, MBeanCatalog, RefreshOutcome,
};
pub use pattern::{GlobPattern, PatternFilter};
pub use types::{
    AttributeDescriptor, ManagedEntity, NotificationDescriptor, OperationDescriptor,
    OperationImpact, ParameterDescriptor,
};
