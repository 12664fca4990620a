//! Request classification and strategy dispatch.

use harbor_core::{CacheStoreRegistry, Error, Request, StoreKind};
use serde::Serialize;

use crate::manifest::AppManifest;
use crate::strategy::{OfflineDocument, PendingWrite, Served, Strategies};

/// Traffic class of a request. A pure function of its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    StaticAsset,
    ThirdPartyTile,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    NetworkOnly,
}

impl RequestClass {
    /// Fixed binding of each class to its strategy and store.
    pub const fn binding(self) -> (Strategy, StoreKind) {
        match self {
            RequestClass::StaticAsset => (Strategy::CacheFirst, StoreKind::Static),
            RequestClass::ThirdPartyTile => (Strategy::NetworkOnly, StoreKind::Tile),
            RequestClass::Dynamic => (Strategy::NetworkFirst, StoreKind::Dynamic),
        }
    }
}

/// Classify a request. Tile hosts are checked before static paths; method is ignored.
pub fn classify(manifest: &AppManifest, request: &Request) -> RequestClass {
    if request.host().is_some_and(|host| manifest.is_tile_host(host)) {
        RequestClass::ThirdPartyTile
    } else if same_origin(manifest, request) && manifest.is_static_path(request.path()) {
        RequestClass::StaticAsset
    } else {
        RequestClass::Dynamic
    }
}

fn same_origin(manifest: &AppManifest, request: &Request) -> bool {
    manifest.scope().origin() == request.url.origin()
}

/// A routed request.
#[derive(Debug)]
pub struct Routed {
    pub class: RequestClass,
    pub served: Served,
    pub write: Option<PendingWrite>,
}

/// Sends each request through exactly one strategy against exactly one store.
#[derive(Clone)]
pub struct Router {
    manifest: AppManifest,
    registry: CacheStoreRegistry,
    strategies: Strategies,
}

impl Router {
    pub fn new(manifest: AppManifest, registry: CacheStoreRegistry, strategies: Strategies) -> Self {
        Self { manifest, registry, strategies }
    }

    pub async fn route(&self, request: &Request) -> Result<Routed, Error> {
        let class = classify(&self.manifest, request);
        let (strategy, kind) = class.binding();
        let store = self.registry.name_of(kind);
        tracing::debug!("routing {} {} as {:?} via {:?} on {}", request.method, request.url, class, strategy, store);

        let outcome = match strategy {
            Strategy::CacheFirst => self.strategies.cache_first(request, store).await?,
            Strategy::NetworkOnly => self.strategies.network_only(request, store).await?,
            Strategy::NetworkFirst => {
                let entry = Request::get(self.manifest.entry_point().clone());
                let offline = OfflineDocument { store: self.registry.static_store(), request: &entry };
                self.strategies.network_first(request, store, offline).await?
            }
        };

        Ok(Routed { class, served: outcome.served, write: outcome.write })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{ScriptedNetwork, ok};
    use harbor_core::CacheDb;
    use std::sync::Arc;
    use url::Url;

    fn manifest() -> AppManifest {
        AppManifest::builtin(&Url::parse("http://app.test/").unwrap()).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::parse_get(url).unwrap()
    }

    #[test]
    fn test_classify() {
        let m = manifest();
        assert_eq!(classify(&m, &get("http://app.test/")), RequestClass::StaticAsset);
        assert_eq!(classify(&m, &get("http://app.test/index.html")), RequestClass::StaticAsset);
        assert_eq!(classify(&m, &get("http://app.test/icons/x.png")), RequestClass::StaticAsset);
        assert_eq!(classify(&m, &get("http://app.test/api/data")), RequestClass::Dynamic);
        assert_eq!(
            classify(&m, &get("https://maps.googleapis.com/maps/api/js?key=abc")),
            RequestClass::ThirdPartyTile
        );
        assert_eq!(
            classify(&m, &get("https://www.google-analytics.com/analytics.js")),
            RequestClass::ThirdPartyTile
        );
    }

    #[test]
    fn test_classify_ignores_method() {
        let m = manifest();
        let post = Request::new("post", Url::parse("http://app.test/index.html").unwrap());
        assert_eq!(classify(&m, &post), RequestClass::StaticAsset);
    }

    #[test]
    fn test_static_path_on_foreign_origin_is_dynamic() {
        let m = manifest();
        assert_eq!(classify(&m, &get("http://cdn.test/index.html")), RequestClass::Dynamic);
    }

    #[test]
    fn test_tile_host_wins_over_static_path() {
        let m = manifest();
        assert_eq!(
            classify(&m, &get("https://maps.googleapis.com/icons/icon-72x72.png")),
            RequestClass::ThirdPartyTile
        );
    }

    #[test]
    fn test_bindings() {
        assert_eq!(RequestClass::StaticAsset.binding(), (Strategy::CacheFirst, StoreKind::Static));
        assert_eq!(RequestClass::ThirdPartyTile.binding(), (Strategy::NetworkOnly, StoreKind::Tile));
        assert_eq!(RequestClass::Dynamic.binding(), (Strategy::NetworkFirst, StoreKind::Dynamic));
    }

    #[tokio::test]
    async fn test_route_writes_only_the_bound_store() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(ScriptedNetwork::new());
        let registry = CacheStoreRegistry::current();
        let router = Router::new(manifest(), registry.clone(), Strategies::new(db.clone(), network.clone()));
        network.respond("https://maps.googleapis.com/tile/1", ok("tile"));

        let routed = router.route(&get("https://maps.googleapis.com/tile/1")).await.unwrap();
        assert_eq!(routed.class, RequestClass::ThirdPartyTile);
        routed.write.unwrap().settle().await.unwrap();

        assert_eq!(db.list_store_names().await.unwrap(), vec![registry.tile_store().to_string()]);
    }

    #[tokio::test]
    async fn test_route_dynamic_offline_serves_entry_point() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(ScriptedNetwork::new());
        let registry = CacheStoreRegistry::current();
        let router = Router::new(manifest(), registry.clone(), Strategies::new(db.clone(), network.clone()));
        db.store_put(registry.static_store(), &get("http://app.test/index.html"), &ok("<shell>"))
            .await
            .unwrap();
        network.set_offline(true);

        let routed = router.route(&get("http://app.test/pins/42")).await.unwrap();

        assert_eq!(routed.class, RequestClass::Dynamic);
        assert_eq!(routed.served.source, ResponseSource::OfflineFallback);
        assert_eq!(&routed.served.response.body[..], b"<shell>");
    }
}
