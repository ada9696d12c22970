//! Attribute value cache.
//!
//! Values are kept for a fixed TTL. A live read compares the fresh value with
//! the last one observed for the same resource address and notifies listeners
//! when it changed. Expired entries are swept opportunistically every
//! `cleanup_every` inserts.

pub mod events;

use std::{
    collections::{BTreeSet, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use events::{ChangeEvent, ResourceChangeListener};

use crate::{
    catalog::MBeanCatalog,
    core::{config::ResourcesConfig, manager::ConnectionManager, metrics::JmxMetrics},
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
    mapper::ResourceMapper,
};

const SENSITIVE_ATTRIBUTE_MARKERS: &[&str] = &["password", "secret", "key", "token"];

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub valid: usize,
}

pub struct ResourceCache {
    catalog: Arc<MBeanCatalog>,
    manager: Arc<ConnectionManager>,
    mapper: Arc<ResourceMapper>,
    ttl: Duration,
    cleanup_every: u64,
    entries: DashMap<String, CacheEntry>,
    /// Last observed value per resource address, kept across expiry
    last_known: DashMap<String, Value>,
    listeners: RwLock<Vec<Arc<dyn ResourceChangeListener>>>,
    inserts: AtomicU64,
    metrics: Arc<JmxMetrics>,
}

fn cache_key(identity: &ObjectIdentity, attribute: &str) -> String {
    format!("{}#{}", identity, attribute)
}

impl ResourceCache {
    pub fn new(
        catalog: Arc<MBeanCatalog>,
        manager: Arc<ConnectionManager>,
        mapper: Arc<ResourceMapper>,
        config: &ResourcesConfig,
    ) -> Self {
        let metrics = manager.metrics().clone();
        Self {
            catalog,
            manager,
            mapper,
            ttl: config.cache_ttl(),
            cleanup_every: config.cleanup_every,
            entries: DashMap::new(),
            last_known: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            inserts: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn add_listener(&self, listener: Arc<dyn ResourceChangeListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Read an attribute, from cache when fresh and live otherwise.
    pub async fn read(&self, identity: &ObjectIdentity, attribute: &str) -> JmxResult<Value> {
        let key = cache_key(identity, attribute);

        if let Some(value) = self.fresh(&key) {
            debug!("Returning cached value for {}.{}", identity, attribute);
            self.metrics.record_cache_hit();
            return Ok(value);
        }
        self.metrics.record_cache_miss();

        let entity = self
            .catalog
            .get(identity)
            .ok_or_else(|| JmxError::EntityNotFound(identity.to_string()))?;
        let descriptor = entity
            .attribute(attribute)
            .ok_or_else(|| JmxError::AttributeNotFound {
                identity: identity.to_string(),
                attribute: attribute.to_string(),
            })?;
        if !descriptor.readable {
            return Err(JmxError::AttributeNotReadable {
                identity: identity.to_string(),
                attribute: attribute.to_string(),
            });
        }
        if is_sensitive_attribute(attribute) {
            warn!(
                "Reading potentially sensitive attribute {}.{}",
                identity, attribute
            );
        }

        let conn = self.manager.connection()?;
        let value = conn.read_attribute(identity, attribute).await?;

        let uri = self.mapper.to_address(identity, attribute);
        if let Some(previous) = self.last_known.insert(uri.clone(), value.clone()) {
            if previous != value {
                debug!("Resource {} changed", uri);
                self.notify_changed(ChangeEvent::new(uri, previous, value.clone()));
            }
        }

        self.store(key, value.clone());
        Ok(value)
    }

    fn fresh(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    fn store(&self, key: String, value: Value) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key, entry);

        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if self.cleanup_every > 0 && inserts % self.cleanup_every == 0 {
            self.cleanup_expired();
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        debug!(
            "Cleaned up {} expired cache entries, {} remaining",
            removed,
            self.entries.len()
        );
        removed
    }

    /// Drop one cached value.
    pub fn invalidate(&self, identity: &ObjectIdentity, attribute: &str) {
        self.entries.remove(&cache_key(identity, attribute));
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
        info!("Cleared attribute value cache");
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired(now))
            .count();
        CacheStats {
            total,
            expired,
            valid: total.saturating_sub(expired),
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn ResourceChangeListener>> {
        self.listeners.read().clone()
    }

    fn notify_changed(&self, event: ChangeEvent) {
        self.metrics.record_change_event();
        for listener in self.listeners() {
            let event = event.clone();
            tokio::spawn(async move {
                listener.on_resource_changed(&event).await;
            });
        }
    }

    /// Tell listeners which resource addresses appeared and disappeared
    /// between two listings. Must be called within a tokio runtime.
    pub fn notify_resource_set_changed(&self, old: &HashSet<String>, new: &HashSet<String>) {
        let added = sorted_difference(new, old);
        let removed = sorted_difference(old, new);

        if !added.is_empty() {
            info!("{} new resources available", added.len());
            for listener in self.listeners() {
                let added = added.clone();
                tokio::spawn(async move {
                    listener.on_resources_added(&added).await;
                });
            }
        }
        if !removed.is_empty() {
            info!("{} resources removed", removed.len());
            for listener in self.listeners() {
                let removed = removed.clone();
                tokio::spawn(async move {
                    listener.on_resources_removed(&removed).await;
                });
            }
        }
    }
}

fn sorted_difference(a: &HashSet<String>, b: &HashSet<String>) -> Vec<String> {
    a.difference(b)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_sensitive_attribute(attribute: &str) -> bool {
    let lower = attribute.to_lowercase();
    SENSITIVE_ATTRIBUTE_MARKERS.iter().any(|m| lower.contains(m))
}
