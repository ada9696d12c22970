//! JMX MCP bridge.
//!
//! Exposes MBean servers as read-only resources and invocable tools. The
//! connection, discovery, catalog and cache machinery lives in [`jmx_core`];
//! this crate adds the guarded service surface, configuration loading and
//! logging bootstrap.
//!
//! ```ignore
//! let config = AppConfig::from_file("jmx-mcp.yaml").await?.with_env_overrides();
//! init_logging(&config.logging)?;
//! let service = Bridge::start(config.jmx, connector, Arc::new(NoAttach)).await?;
//! let refresher = service.spawn_background_refresh(shutdown.clone());
//! ```

pub mod bridge;
pub mod config;
pub mod convert;
pub mod logging;
pub mod service;

pub use bridge::Bridge;
pub use config::AppConfig;
pub use logging::{init_logging, LogConfig};
pub use service::{AttributeValue, JmxService, MBeanSummary, ResourceContents};

pub use jmx_core;
