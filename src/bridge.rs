//! Startup sequence.

use std::sync::Arc;

use jmx_core::{discovery::ProcessAttacher, Connector, JmxConfig, JmxResult, RefreshOutcome};
use tracing::{info, warn};

use crate::service::JmxService;

pub struct Bridge;

impl Bridge {
    /// Validate `config`, build the service and bring it up.
    ///
    /// Only invalid configuration fails. Unreachable connections, discovery
    /// and refresh problems are logged and the service starts anyway.
    pub async fn start(
        config: JmxConfig,
        connector: Arc<dyn Connector>,
        attacher: Arc<dyn ProcessAttacher>,
    ) -> JmxResult<Arc<JmxService>> {
        config.validate()?;
        info!("Initializing JMX MCP bridge");

        let service = Arc::new(JmxService::new(config, connector, attacher)?);
        let config = service.config();

        service.manager().initialize(config).await;

        if config.service_discovery.enabled && config.service_discovery.auto_register {
            let registered = service.auto_register().await;
            info!("Registered {} discovered JMX service(s) at startup", registered);
        }

        if config.discovery.discover_on_startup {
            match service.refresh().await {
                Ok(RefreshOutcome::Refreshed { mbeans }) => {
                    info!("Startup MBean discovery cataloged {} MBeans", mbeans)
                }
                Ok(RefreshOutcome::Skipped) => {
                    info!("No active JMX connection, startup MBean discovery skipped")
                }
                Err(e) => warn!("Startup MBean discovery failed: {}", e),
            }
        }

        info!(
            "JMX MCP bridge ready: {} connection(s), {} MBeans",
            service.manager().list_connections().len(),
            service.catalog().count()
        );
        Ok(service)
    }
}
