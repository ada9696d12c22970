//! Connection registry.
//!
//! Stores descriptors by id plus a single active pointer. The map is a
//! `BTreeMap`, so "some remaining id" after removing the active entry is
//! always the lexicographically smallest one.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::descriptor::ConnectionDescriptor;
use crate::upstream::LiveConnection;

#[derive(Default)]
struct RegistryState {
    connections: BTreeMap<String, ConnectionDescriptor>,
    active: Option<String>,
}

/// Returns the entry previously stored under the same id.
fn insert_locked(
    state: &mut RegistryState,
    descriptor: ConnectionDescriptor,
) -> Option<ConnectionDescriptor> {
    let id = descriptor.id().to_string();
    info!("Adding JMX connection: {} ({})", descriptor.name(), id);
    let replaced = state.connections.insert(id.clone(), descriptor);
    if state.active.is_none() {
        info!("Set as active connection: {}", id);
        state.active = Some(id);
    }
    replaced
}

#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor. The first entry in an empty registry
    /// becomes active. A replaced entry's live handle is closed.
    pub async fn add(&self, descriptor: ConnectionDescriptor) {
        let id = descriptor.id().to_string();
        let replaced = {
            let mut state = self.state.write();
            insert_locked(&mut state, descriptor)
        };

        if let Some(handle) = replaced.and_then(ConnectionDescriptor::into_handle) {
            info!("Replaced live JMX connection: {}", id);
            close_handle(&id, handle).await;
        }
    }

    /// Add only if the id is not registered yet. Returns whether it was added.
    pub fn add_if_absent(&self, descriptor: ConnectionDescriptor) -> bool {
        let mut state = self.state.write();
        if state.connections.contains_key(descriptor.id()) {
            return false;
        }
        insert_locked(&mut state, descriptor);
        true
    }

    /// Replace an existing descriptor. Unknown ids are ignored.
    pub fn update(&self, descriptor: ConnectionDescriptor) {
        let mut state = self.state.write();
        match state.connections.get_mut(descriptor.id()) {
            Some(slot) => {
                debug!(
                    "Updated JMX connection: {} - {}",
                    descriptor.id(),
                    descriptor.status()
                );
                *slot = descriptor;
            }
            None => warn!(
                "Attempted to update non-existent connection: {}",
                descriptor.id()
            ),
        }
    }

    /// Replace an existing descriptor only while the stored one satisfies
    /// `current`. Returns whether it was replaced.
    pub fn update_if(
        &self,
        descriptor: ConnectionDescriptor,
        current: impl FnOnce(&ConnectionDescriptor) -> bool,
    ) -> bool {
        let mut state = self.state.write();
        let Some(slot) = state.connections.get_mut(descriptor.id()) else {
            warn!(
                "Attempted to update non-existent connection: {}",
                descriptor.id()
            );
            return false;
        };
        if !current(&*slot) {
            debug!("Skipped stale update of JMX connection: {}", descriptor.id());
            return false;
        }
        debug!(
            "Updated JMX connection: {} - {}",
            descriptor.id(),
            descriptor.status()
        );
        *slot = descriptor;
        true
    }

    /// Remove a descriptor, closing its live handle. Returns false for unknown ids.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let Some(removed) = state.connections.remove(id) else {
                return false;
            };
            if state.active.as_deref() == Some(id) {
                state.active = state.connections.keys().next().cloned();
                match &state.active {
                    Some(next) => info!("Active connection removed, switched to: {}", next),
                    None => info!("Active connection removed, no connections remain"),
                }
            }
            removed
        };

        info!("Removed JMX connection: {} ({})", removed.name(), id);
        if let Some(handle) = removed.into_handle() {
            close_handle(id, handle).await;
        }
        true
    }

    /// Make `id` active. Returns false if it is not registered.
    pub fn set_active(&self, id: &str) -> bool {
        let mut state = self.state.write();
        if state.connections.contains_key(id) {
            state.active = Some(id.to_string());
            info!("Set active JMX connection: {}", id);
            true
        } else {
            warn!("Cannot set active connection, not found: {}", id);
            false
        }
    }

    /// Forget the active pointer without touching any entry.
    pub fn clear_active(&self) {
        self.state.write().active = None;
    }

    /// The active descriptor, if any.
    pub fn active(&self) -> Option<ConnectionDescriptor> {
        let state = self.state.read();
        state
            .active
            .as_ref()
            .and_then(|id| state.connections.get(id))
            .cloned()
    }

    /// Id of the active descriptor, if any.
    pub fn active_id(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    /// A copy of the descriptor stored under `id`.
    pub fn get(&self, id: &str) -> Option<ConnectionDescriptor> {
        self.state.read().connections.get(id).cloned()
    }

    /// All descriptors, ordered by id.
    pub fn all(&self) -> Vec<ConnectionDescriptor> {
        self.state.read().connections.values().cloned().collect()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.state.read().connections.keys().cloned().collect()
    }

    /// Whether `id` is registered.
    pub fn has(&self, id: &str) -> bool {
        self.state.read().connections.contains_key(id)
    }

    /// Number of registered descriptors.
    pub fn count(&self) -> usize {
        self.state.read().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().connections.is_empty()
    }

    /// Close every live handle and empty the registry.
    pub async fn close_all(&self) {
        let drained = {
            let mut state = self.state.write();
            state.active = None;
            std::mem::take(&mut state.connections)
        };

        info!("Closing {} JMX connection(s)", drained.len());
        for (id, descriptor) in drained {
            if let Some(handle) = descriptor.into_handle() {
                close_handle(&id, handle).await;
            }
        }
    }

    /// One line per connection, active entry marked.
    pub fn summary(&self) -> String {
        let state = self.state.read();
        if state.connections.is_empty() {
            return "No JMX connections registered".to_string();
        }

        let mut out = format!("JMX Connections ({}):\n", state.connections.len());
        for (id, descriptor) in &state.connections {
            let marker = if state.active.as_deref() == Some(id.as_str()) {
                " [ACTIVE]"
            } else {
                ""
            };
            out.push_str(&format!("  {}{}\n", descriptor.display_string(), marker));
        }
        out
    }
}

async fn close_handle(id: &str, handle: LiveConnection) {
    match handle.close().await {
        Ok(()) => debug!("Closed JMX connection: {}", id),
        Err(e) => warn!("Error closing JMX connection '{}': {}", id, e),
    }
}
