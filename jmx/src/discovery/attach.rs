//! Local process attach.
//!
//! Enumerating and attaching to processes hosting the management runtime is
//! platform specific, so it sits behind [`ProcessAttacher`]. [`NoAttach`] is
//! used where no attach mechanism is available.

use async_trait::async_trait;

use crate::error::JmxResult;

/// Agent property holding a process's local management endpoint.
pub const LOCAL_CONNECTOR_ADDRESS: &str = "com.sun.management.jmxremote.localConnectorAddress";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Usually the command line, main class first.
    pub display_name: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, display_name: impl Into<String>) -> Self {
        Self {
            pid,
            display_name: display_name.into(),
        }
    }
}

#[async_trait]
pub trait ProcessAttacher: Send + Sync {
    async fn list_processes(&self) -> JmxResult<Vec<ProcessInfo>>;

    async fn attach(&self, pid: u32) -> JmxResult<Box<dyn AttachedProcess>>;
}

/// A process we are attached to. Callers must [`detach`](AttachedProcess::detach).
#[async_trait]
pub trait AttachedProcess: Send + Sync {
    async fn agent_property(&self, key: &str) -> JmxResult<Option<String>>;

    async fn start_local_management_agent(&self) -> JmxResult<()>;

    async fn detach(&mut self) -> JmxResult<()>;
}

/// Reports no local processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttach;

#[async_trait]
impl ProcessAttacher for NoAttach {
    async fn list_processes(&self) -> JmxResult<Vec<ProcessInfo>> {
        Ok(Vec::new())
    }

    async fn attach(&self, pid: u32) -> JmxResult<Box<dyn AttachedProcess>> {
        Err(crate::error::JmxError::ConnectionFailed(format!(
            "process attach is not supported (pid {})",
            pid
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_attach() {
        assert!(NoAttach.list_processes().await.unwrap().is_empty());
        assert!(NoAttach.attach(42).await.is_err());
    }
}
