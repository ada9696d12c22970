//! MBean catalog.
//!
//! Pattern-filtered metadata for every MBean on the active connection. Each
//! refresh builds a complete new snapshot and swaps it in atomically; readers
//! always see either the old or the new snapshot, never a mix.

use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::Arc,
    time::Duration,
};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{pattern::PatternFilter, types::ManagedEntity};
use crate::{
    core::{config::CatalogConfig, manager::ConnectionManager, metrics::JmxMetrics},
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
};

/// Immutable point-in-time view of the catalog.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    entities: BTreeMap<ObjectIdentity, Arc<ManagedEntity>>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    pub fn new(entities: impl IntoIterator<Item = ManagedEntity>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.identity.clone(), Arc::new(e)))
                .collect(),
            refreshed_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, identity: &ObjectIdentity) -> Option<&Arc<ManagedEntity>> {
        self.entities.get(identity)
    }

    /// Entities ordered by identity.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ManagedEntity>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub mbeans: usize,
    pub attributes: usize,
    pub operations: usize,
    pub domains: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No live connection; the previous snapshot was kept
    Skipped,
    Refreshed { mbeans: usize },
}

pub struct MBeanCatalog {
    manager: Arc<ConnectionManager>,
    filter: PatternFilter,
    snapshot: ArcSwap<CatalogSnapshot>,
    metrics: Arc<JmxMetrics>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl MBeanCatalog {
    pub fn new(manager: Arc<ConnectionManager>, config: &CatalogConfig) -> JmxResult<Self> {
        let filter = PatternFilter::new(config.effective_include(), &config.exclude)?;
        let metrics = manager.metrics().clone();
        Ok(Self {
            manager,
            filter,
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::default()),
            metrics,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Whether `identity` passes the include/exclude filter.
    pub fn accepts(&self, identity: &ObjectIdentity) -> bool {
        self.filter.accepts(&identity.to_string())
    }

    /// Rebuild the snapshot from the active connection.
    ///
    /// Listing failures are returned; individual describe failures are logged
    /// and the MBean is left out.
    pub async fn refresh(&self) -> JmxResult<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let conn = match self.manager.connection() {
            Ok(conn) => conn,
            Err(JmxError::NoActiveConnection) | Err(JmxError::NotConnected) => {
                info!("No active JMX connection, skipping MBean discovery");
                return Ok(RefreshOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        info!("Starting MBean discovery...");
        let identities = conn.list_identities().await?;
        let total = identities.len();

        let mut entities = Vec::new();
        for identity in identities.into_iter().filter(|id| self.accepts(id)) {
            match conn.describe(&identity).await {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!("Failed to get MBean info for {}: {}", identity, e),
            }
        }

        let snapshot = CatalogSnapshot::new(entities);
        let mbeans = snapshot.len();
        self.snapshot.store(Arc::new(snapshot));
        self.metrics.record_catalog_refresh();

        info!(
            "MBean discovery completed. Cataloged {} of {} MBeans",
            mbeans, total
        );
        Ok(RefreshOutcome::Refreshed { mbeans })
    }

    /// Drop all cataloged MBeans.
    pub fn clear(&self) {
        self.snapshot.store(Arc::new(CatalogSnapshot::default()));
    }

    /// The current snapshot, for consistent multi-step reads.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    pub fn get(&self, identity: &ObjectIdentity) -> Option<Arc<ManagedEntity>> {
        self.snapshot.load().get(identity).cloned()
    }

    pub fn all(&self) -> Vec<Arc<ManagedEntity>> {
        self.snapshot.load().iter().cloned().collect()
    }

    pub fn identities(&self) -> Vec<ObjectIdentity> {
        self.snapshot
            .load()
            .iter()
            .map(|e| e.identity.clone())
            .collect()
    }

    pub fn by_domain(&self, domain: &str) -> Vec<Arc<ManagedEntity>> {
        self.snapshot
            .load()
            .iter()
            .filter(|e| e.identity.domain() == domain)
            .cloned()
            .collect()
    }

    /// MBeans whose `type` key property equals `type_name`.
    pub fn by_type(&self, type_name: &str) -> Vec<Arc<ManagedEntity>> {
        self.snapshot
            .load()
            .iter()
            .filter(|e| e.identity.type_property() == Some(type_name))
            .cloned()
            .collect()
    }

    /// Sorted distinct domains.
    pub fn domains(&self) -> Vec<String> {
        self.snapshot
            .load()
            .iter()
            .map(|e| e.identity.domain().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn stats(&self) -> CatalogStats {
        let snapshot = self.snapshot.load();
        let mut domains = BTreeSet::new();
        let mut stats = CatalogStats::default();
        for entity in snapshot.iter() {
            stats.mbeans += 1;
            stats.attributes += entity.attributes.len();
            stats.operations += entity.operations.len();
            domains.insert(entity.identity.domain());
        }
        stats.domains = domains.len();
        stats
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.snapshot.load().refreshed_at()
    }

    /// Refresh every `period` while the active connection answers probes.
    ///
    /// The first refresh happens one period after spawning.
    pub fn spawn_background_refresh(
        self: Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.manager.clone();
        spawn_periodic_refresh(manager, period, shutdown, move || {
            let catalog = self.clone();
            async move { catalog.refresh().await }
        })
    }
}

/// Run `refresh` every `period` until `shutdown` fires, skipping ticks on
/// which the active connection of `manager` fails its liveness probe.
///
/// The first tick happens one period after spawning. Missed ticks are
/// skipped rather than bunched up.
pub fn spawn_periodic_refresh<F, Fut, T>(
    manager: Arc<ConnectionManager>,
    period: Duration,
    shutdown: CancellationToken,
    mut refresh: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = JmxResult<T>> + Send + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Background refresh stopped");
                    break;
                }
                _ = interval.tick() => {}
            }

            if !manager.is_connected().await {
                debug!("Scheduled refresh skipped, not connected");
                continue;
            }
            debug!("Performing scheduled MBean discovery");
            if let Err(e) = refresh().await {
                warn!("Scheduled MBean discovery failed: {}", e);
            }
        }
    })
}
