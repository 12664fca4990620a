//! Install and activate handling.
//!
//! Install pre-caches the manifest into the static store as one batch.
//! Activate deletes every store this build does not own, then claims windows.

use std::fmt;
use std::sync::Arc;

use harbor_client::Network;
use harbor_core::{CacheStorage, CacheStoreRegistry, Error, Request, Response};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::clients::Clients;
use crate::manifest::AppManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub store: String,
    pub cached: usize,
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub failed: Vec<StoreFailure>,
    pub claimed: usize,
}

pub struct LifecycleManager {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    registry: CacheStoreRegistry,
    manifest: AppManifest,
    clients: Arc<dyn Clients>,
    state: RwLock<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, registry: CacheStoreRegistry,
        manifest: AppManifest, clients: Arc<dyn Clients>,
    ) -> Self {
        Self { storage, network, registry, manifest, clients, state: RwLock::new(LifecycleState::Parsed) }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn transition(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        tracing::info!("lifecycle {} -> {}", *state, next);
        *state = next;
    }

    /// Fetch every manifest asset and write them to the static store.
    ///
    /// All fetches must succeed with a 2xx status; otherwise nothing is
    /// written and the worker becomes redundant.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Installing).await;

        match self.precache().await {
            Ok(cached) => {
                self.transition(LifecycleState::Installed).await;
                Ok(InstallReport { store: self.registry.static_store().to_string(), cached, skip_waiting: true })
            }
            Err(e) => {
                tracing::warn!(error = %e, "install failed");
                self.transition(LifecycleState::Redundant).await;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let store = self.registry.static_store();
        self.storage.open_store(store).await?;

        let mut set = JoinSet::new();
        for (index, url) in self.manifest.assets().iter().enumerate() {
            let network = Arc::clone(&self.network);
            let request = Request::get(url.clone());
            set.spawn(async move {
                let result = network.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut fetched: Vec<(usize, Request, Response)> = Vec::with_capacity(self.manifest.assets().len());
        while let Some(joined) = set.join_next().await {
            let (index, request, result) =
                joined.map_err(|e| Error::InstallFailed(format!("fetch task aborted: {e}")))?;
            let response = result.map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url)))?;
            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{}: status {}", request.url, response.status)));
            }
            fetched.push((index, request, response));
        }

        fetched.sort_by_key(|(index, _, _)| *index);
        let entries: Vec<(Request, Response)> = fetched.into_iter().map(|(_, req, resp)| (req, resp)).collect();
        let count = entries.len();
        self.storage.store_put_all(store, entries).await?;
        tracing::info!("pre-cached {} assets into {}", count, store);
        Ok(count)
    }

    /// Delete stores outside the registry, then claim open windows.
    ///
    /// A failed deletion is recorded and does not stop the others.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(LifecycleState::Activating).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for name in self.storage.list_store_names().await? {
            if self.registry.contains(&name) {
                continue;
            }
            match self.storage.delete_store(&name).await {
                Ok(_) => {
                    tracing::info!("deleted stale store {}", name);
                    deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to delete stale store");
                    failed.push(StoreFailure { name, error: e.to_string() });
                }
            }
        }

        let claimed = self.clients.claim().await?;
        self.transition(LifecycleState::Activated).await;
        Ok(ActivateReport { deleted, failed, claimed })
    }
}
