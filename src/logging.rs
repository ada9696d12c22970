//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set. Output goes to stderr
//! by default so a stdio tool transport can own stdout.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable text
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_true")]
    pub ansi: bool,

    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Write to stderr; stdout when false
    #[serde(default = "default_true")]
    pub stderr: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            ansi: true,
            show_target: true,
            stderr: true,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    /// The configured level, `INFO` when unrecognised.
    pub fn get_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.get_level().as_str().to_lowercase()))
    }

    fn writer(&self) -> BoxMakeWriter {
        if self.stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.filter());

    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.show_target)
                    .with_writer(config.writer()),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(config.ansi)
                    .with_target(config.show_target)
                    .with_writer(config.writer()),
            )
            .try_init()
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
