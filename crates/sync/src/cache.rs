//! Best-effort offline resource cache.
//!
//! On startup the portal prefetches a fixed manifest of resources
//! (schedules, contact directories, form templates) into the durable
//! store so they stay readable offline. Prefetch never blocks startup
//! and never fails the caller: a resource that cannot be fetched is
//! logged, counted, and skipped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use civiport_common::PersistentStore;

use crate::remote::RemoteError;

/// Fetches one resource body by id.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource_id: &str) -> Result<String, RemoteError>;
}

/// Outcome of one prefetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSummary {
    pub cached: usize,
    pub failed: usize,
}

pub struct ResourceCache {
    fetcher: Arc<dyn ResourceFetcher>,
    store: Arc<dyn PersistentStore>,
    manifest: Vec<String>,
}

impl ResourceCache {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        store: Arc<dyn PersistentStore>,
        manifest: Vec<String>,
    ) -> Self {
        Self { fetcher, store, manifest }
    }

    /// Fetch every manifest entry into the store, sequentially.
    #[instrument(skip(self), fields(manifest = self.manifest.len()))]
    pub async fn cache_resources(&self) -> CacheSummary {
        let mut summary = CacheSummary::default();

        for resource_id in &self.manifest {
            match self.fetcher.fetch(resource_id).await {
                Ok(body) => match self.store.set(&Self::store_key(resource_id), body).await {
                    Ok(()) => {
                        debug!(resource_id, "resource cached");
                        summary.cached += 1;
                    }
                    Err(err) => {
                        warn!(resource_id, error = %err, "failed to persist resource");
                        summary.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(resource_id, error = %err, "failed to fetch resource");
                    summary.failed += 1;
                }
            }
        }

        info!(cached = summary.cached, failed = summary.failed, "resource prefetch finished");
        summary
    }

    /// Read a previously cached resource body.
    pub async fn cached_resource(&self, resource_id: &str) -> Option<String> {
        self.store.get(&Self::store_key(resource_id)).await.ok().flatten()
    }

    /// Run the prefetch on a background task so startup never waits on it.
    pub fn spawn_prefetch(self: Arc<Self>) -> tokio::task::JoinHandle<CacheSummary> {
        tokio::spawn(async move { self.cache_resources().await })
    }

    fn store_key(resource_id: &str) -> String {
        format!("resource:{resource_id}")
    }
}
