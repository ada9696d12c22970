//! Service discovery: port scan and local process attach.

pub mod attach;
pub mod service;

pub use attach::{AttachedProcess, NoAttach, ProcessAttacher, ProcessInfo, LOCAL_CONNECTOR_ADDRESS};
pub use service::{DiscoveryResult, DiscoveryService};
