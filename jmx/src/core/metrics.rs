//! Counters for connection, discovery, catalog and cache activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared by the manager, discovery service, catalog and cache.
#[derive(Debug, Default)]
pub struct JmxMetrics {
    // Connection metrics
    connection_attempts: AtomicU64,
    connection_failures: AtomicU64,
    probes: AtomicU64,
    probe_failures: AtomicU64,

    // Discovery metrics
    discovery_probes: AtomicU64,
    discovery_timeouts: AtomicU64,

    // Catalog metrics
    catalog_refreshes: AtomicU64,

    // Cache metrics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    change_events: AtomicU64,
}

impl JmxMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a dial attempt and whether it ended CONNECTED.
    pub fn record_connection_attempt(&self, success: bool) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.connection_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a liveness probe on a registered connection.
    pub fn record_probe(&self, success: bool) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a discovery probe and whether it ran out of time.
    pub fn record_discovery_probe(&self, timed_out: bool) {
        self.discovery_probes.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.discovery_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a completed catalog refresh.
    pub fn record_catalog_refresh(&self) {
        self.catalog_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a resource read served from the cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a resource read that went upstream.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a change event delivered to listeners.
    pub fn record_change_event(&self) {
        self.change_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            discovery_probes: self.discovery_probes.load(Ordering::Relaxed),
            discovery_timeouts: self.discovery_timeouts.load(Ordering::Relaxed),
            catalog_refreshes: self.catalog_refreshes.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            change_events: self.change_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`JmxMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connection_attempts: u64,
    pub connection_failures: u64,
    pub probes: u64,
    pub probe_failures: u64,
    pub discovery_probes: u64,
    pub discovery_timeouts: u64,
    pub catalog_refreshes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub change_events: u64,
}

impl MetricsSnapshot {
    /// Hits over lookups, 0.0 before any lookup.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
