//! Event dispatch table.
//!
//! Every host event maps to exactly one handler. Events and outcomes are
//! serde types so the `harbor` binary can speak JSON lines.

use std::sync::Arc;

use harbor_client::{Network, canonicalize};
use harbor_core::{CacheStorage, CacheStoreRegistry, Error, Request, StoreKind};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::clients::{Clients, Notifier};
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleManager, LifecycleState};
use crate::manifest::AppManifest;
use crate::notification::{ClickOutcome, NotificationDispatcher, NotificationIntent};
use crate::router::{RequestClass, Router};
use crate::strategy::{PendingWrite, ResponseSource, Strategies};
use crate::sync::{DeferredSync, SyncBackend, SyncOutcome};

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Install,
    Activate,
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
    },
    Sync {
        tag: String,
    },
    Push {
        #[serde(default)]
        data: Option<String>,
    },
    NotificationClick {
        url: String,
        #[serde(default)]
        tag: Option<String>,
    },
    Purge {
        store: StoreKind,
        max_entries: usize,
    },
    Stores,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch { .. } => "fetch",
            Event::Sync { .. } => "sync",
            Event::Push { .. } => "push",
            Event::NotificationClick { .. } => "notification_click",
            Event::Purge { .. } => "purge",
            Event::Stores => "stores",
        }
    }
}

/// A served response as reported to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReply {
    pub class: RequestClass,
    pub source: ResponseSource,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchReply),
    Synced(SyncOutcome),
    Notified(NotificationIntent),
    Clicked(ClickOutcome),
    Purged { store: String, removed: u64 },
    Stores { names: Vec<String>, state: LifecycleState },
}

/// Host-provided collaborators.
pub struct WorkerDeps {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
    pub sync: Arc<dyn SyncBackend>,
}

pub struct Worker {
    manifest: AppManifest,
    registry: CacheStoreRegistry,
    storage: Arc<dyn CacheStorage>,
    router: Router,
    lifecycle: LifecycleManager,
    sync: DeferredSync,
    notifications: NotificationDispatcher,
    writes: Mutex<Vec<PendingWrite>>,
}

impl Worker {
    pub fn new(manifest: AppManifest, registry: CacheStoreRegistry, app_name: &str, deps: WorkerDeps) -> Self {
        let WorkerDeps { storage, network, clients, notifier, sync } = deps;
        let strategies = Strategies::new(Arc::clone(&storage), Arc::clone(&network));
        let router = Router::new(manifest.clone(), registry.clone(), strategies);
        let lifecycle = LifecycleManager::new(
            Arc::clone(&storage),
            network,
            registry.clone(),
            manifest.clone(),
            Arc::clone(&clients),
        );
        let notifications = NotificationDispatcher::new(manifest.clone(), app_name, notifier, clients);

        Self {
            manifest,
            registry,
            storage,
            router,
            lifecycle,
            sync: DeferredSync::new(sync),
            notifications,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        tracing::debug!("dispatching {} event", event.kind());
        match event {
            Event::Install => self.lifecycle.install().await.map(Outcome::Installed),
            Event::Activate => self.lifecycle.activate().await.map(Outcome::Activated),
            Event::Fetch { url, method } => self.fetch(&url, &method).await.map(Outcome::Fetched),
            Event::Sync { tag } => self.sync.handle(&tag).await.map(Outcome::Synced),
            Event::Push { data } => self
                .notifications
                .push(data.as_deref().map(str::as_bytes))
                .await
                .map(Outcome::Notified),
            Event::NotificationClick { url, tag } => {
                let url = self.resolve(&url)?;
                self.notifications.click(tag.as_deref(), &url).await.map(Outcome::Clicked)
            }
            Event::Purge { store, max_entries } => self.purge(store, max_entries).await,
            Event::Stores => Ok(Outcome::Stores {
                names: self.storage.list_store_names().await?,
                state: self.lifecycle.state().await,
            }),
        }
    }

    /// Wait for every cache write started so far.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.writes.lock().await);
        for write in pending {
            // failures were already logged by the write task
            let _ = write.settle().await;
        }
    }

    async fn fetch(&self, url: &str, method: &str) -> Result<FetchReply, Error> {
        let request = Request::new(method, self.resolve(url)?);
        let routed = self.router.route(&request).await?;

        if let Some(write) = routed.write {
            let mut writes = self.writes.lock().await;
            writes.retain(|w| !w.is_finished());
            writes.push(write);
        }

        let response = routed.served.response;
        Ok(FetchReply {
            class: routed.class,
            source: routed.served.source,
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_len: response.body.len(),
            headers: response.headers,
        })
    }

    async fn purge(&self, kind: StoreKind, max_entries: usize) -> Result<Outcome, Error> {
        let store = self.registry.name_of(kind).to_string();
        let removed = self.storage.trim_store(&store, max_entries).await?;
        tracing::info!("purged {} entries from {}", removed, store);
        Ok(Outcome::Purged { store, removed })
    }

    /// Relative references resolve against the scope; the result is canonicalized.
    fn resolve(&self, raw: &str) -> Result<Url, Error> {
        let raw = raw.trim();
        let absolute = match Url::parse(raw) {
            Err(url::ParseError::RelativeUrlWithoutBase) if !raw.is_empty() => self.manifest.resolve(raw)?.to_string(),
            _ => raw.to_string(),
        };
        Ok(canonicalize(&absolute)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{LogNotifier, WindowRegistry};
    use crate::sync::StubSyncBackend;
    use crate::testing::{ScriptedNetwork, ok};
    use harbor_core::CacheDb;
    use std::time::Duration;

    async fn worker() -> (Worker, Arc<CacheDb>, Arc<ScriptedNetwork>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(ScriptedNetwork::new());
        let manifest = AppManifest::builtin(&Url::parse("http://app.test/").unwrap()).unwrap();
        let deps = WorkerDeps {
            storage: db.clone(),
            network: network.clone(),
            clients: Arc::new(WindowRegistry::new()),
            notifier: Arc::new(LogNotifier),
            sync: Arc::new(StubSyncBackend::new(Duration::from_millis(1))),
        };
        (Worker::new(manifest, CacheStoreRegistry::current(), "Pin Point", deps), db, network)
    }

    #[test]
    fn test_event_parsing() {
        let event: Event = serde_json::from_str(r#"{"event":"fetch","url":"/api/data"}"#).unwrap();
        assert_eq!(event, Event::Fetch { url: "/api/data".into(), method: "GET".into() });

        let event: Event = serde_json::from_str(r#"{"event":"purge","store":"tile","max_entries":10}"#).unwrap();
        assert_eq!(event, Event::Purge { store: StoreKind::Tile, max_entries: 10 });

        let event: Event = serde_json::from_str(r#"{"event":"push"}"#).unwrap();
        assert_eq!(event, Event::Push { data: None });

        assert!(serde_json::from_str::<Event>(r#"{"event":"message"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_relative_url_resolves_against_scope() {
        let (worker, _db, network) = worker().await;
        network.respond("http://app.test/api/data", ok("[1,2]"));

        let outcome = worker.dispatch(Event::Fetch { url: "/api/data".into(), method: "GET".into() }).await.unwrap();

        match outcome {
            Outcome::Fetched(reply) => {
                assert_eq!(reply.class, RequestClass::Dynamic);
                assert_eq!(reply.source, ResponseSource::Network);
                assert_eq!(reply.body, "[1,2]");
                assert_eq!(reply.body_len, 5);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_purge_trims_named_store() {
        let (worker, db, network) = worker().await;
        for i in 0..4 {
            let url = format!("http://app.test/pins/{i}");
            network.respond(&url, ok("pin"));
            worker.dispatch(Event::Fetch { url, method: "GET".into() }).await.unwrap();
        }
        worker.flush().await;
        let dynamic = CacheStoreRegistry::current().dynamic_store().to_string();
        assert_eq!(db.entry_count(&dynamic).await.unwrap(), 4);

        let outcome = worker.dispatch(Event::Purge { store: StoreKind::Dynamic, max_entries: 1 }).await.unwrap();

        assert_eq!(outcome, Outcome::Purged { store: dynamic.clone(), removed: 3 });
        assert_eq!(db.entry_count(&dynamic).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stores_reports_state() {
        let (worker, _db, _network) = worker().await;
        let outcome = worker.dispatch(Event::Stores).await.unwrap();
        assert_eq!(outcome, Outcome::Stores { names: vec![], state: LifecycleState::Parsed });
    }

    #[tokio::test]
    async fn test_outcome_json_shape() {
        let (worker, _db, _network) = worker().await;
        let outcome = worker.dispatch(Event::Sync { tag: "sync-tracks".into() }).await.unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["synced"]["status"], "completed");
        assert_eq!(json["synced"]["tag"], "sync-tracks");
    }

    #[tokio::test]
    async fn test_bare_relative_path_resolves_against_scope() {
        let (worker, _db, network) = worker().await;
        network.respond("http://app.test/icons/a.png", ok("png"));

        let outcome = worker.dispatch(Event::Fetch { url: "icons/a.png".into(), method: "GET".into() }).await.unwrap();

        match outcome {
            Outcome::Fetched(reply) => {
                assert_eq!(reply.class, RequestClass::StaticAsset);
                assert_eq!(reply.body, "png");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_post_is_not_replayed_from_cache() {
        let (worker, db, network) = worker().await;
        network.respond("http://app.test/api/pins", ok("{\"created\":1}"));
        let post = || Event::Fetch { url: "/api/pins".into(), method: "POST".into() };

        worker.dispatch(post()).await.unwrap();
        worker.flush().await;
        let dynamic = CacheStoreRegistry::current().dynamic_store().to_string();
        assert!(db.store_keys(&dynamic).await.unwrap().is_empty());

        network.set_offline(true);
        let outcome = worker.dispatch(post()).await.unwrap();

        match outcome {
            Outcome::Fetched(reply) => {
                assert_eq!(reply.source, ResponseSource::OfflineFallback);
                assert_ne!(reply.body, "{\"created\":1}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
