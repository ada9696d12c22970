//! Top-level bridge configuration: the JMX subsystem plus logging.

use jmx_core::{JmxConfig, JmxResult};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub jmx: JmxConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    pub async fn from_file(path: &str) -> JmxResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> JmxResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `JMX_URL`, `JMX_USERNAME`, `JMX_PASSWORD` and `LOG_LEVEL`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.jmx = self.jmx.with_env_overrides();
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
        self
    }

    pub fn validate(&self) -> JmxResult<()> {
        self.jmx.validate()
    }
}
