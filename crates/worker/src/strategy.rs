//! Cache read/write strategies.
//!
//! Each strategy resolves a response for one request against one store.
//! Cache writes never hold up the response: they run on a spawned task and
//! are handed back as a [`PendingWrite`]. Dropping the handle detaches the
//! write, which still runs to completion; a failed write is logged there and
//! otherwise ignored.
//!
//! Only GET requests are read from or written to a store. Any other method
//! goes to the network and is never answered from cache.

use std::sync::Arc;

use harbor_client::Network;
use harbor_core::{CacheStorage, Error, Request, Response};
use serde::Serialize;
use tokio::task::JoinHandle;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
}

/// A response together with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

/// Result of running a strategy.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub served: Served,
    /// Cache write started for this response, if any.
    pub write: Option<PendingWrite>,
}

impl StrategyOutcome {
    fn from_cache(response: Response) -> Self {
        Self { served: Served { response, source: ResponseSource::Cache }, write: None }
    }

    fn from_network(response: Response, write: Option<PendingWrite>) -> Self {
        Self { served: Served { response, source: ResponseSource::Network }, write }
    }

    fn offline(response: Response) -> Self {
        Self { served: Served { response, source: ResponseSource::OfflineFallback }, write: None }
    }
}

/// A detached cache write.
#[derive(Debug)]
pub struct PendingWrite {
    handle: JoinHandle<Result<(), Error>>,
}

impl PendingWrite {
    fn spawn(storage: Arc<dyn CacheStorage>, store: &str, request: &Request, response: &Response) -> Self {
        let store = store.to_string();
        let request = request.clone();
        let response = response.clone();
        let handle = tokio::spawn(async move {
            let result = storage.store_put(&store, &request, &response).await;
            match &result {
                Ok(()) => tracing::debug!(store = %store, url = %request.url, "cache write complete"),
                Err(e) => tracing::warn!(store = %store, url = %request.url, error = %e, "cache write dropped"),
            }
            result
        });
        Self { handle }
    }

    /// Wait for the write and return its result.
    pub async fn settle(self) -> Result<(), Error> {
        self.handle.await.map_err(|e| Error::WriteAborted(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// The offline document used by network-first when both network and store miss.
#[derive(Debug, Clone, Copy)]
pub struct OfflineDocument<'a> {
    pub store: &'a str,
    pub request: &'a Request,
}

/// Strategy runner over one storage and one network.
#[derive(Clone)]
pub struct Strategies {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl Strategies {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { storage, network }
    }

    /// Serve from `store` when present, otherwise fetch.
    ///
    /// A 200 from the network is written back; a network failure propagates.
    pub async fn cache_first(&self, request: &Request, store: &str) -> Result<StrategyOutcome, Error> {
        if let Some(cached) = self.lookup(store, request).await {
            tracing::debug!("cache hit in {} for {}", store, request.url);
            return Ok(StrategyOutcome::from_cache(cached));
        }

        tracing::debug!("cache miss in {} for {}", store, request.url);
        let response = self.network.fetch(request).await?;
        let write = self.write_back_if_ok(store, request, &response);
        Ok(StrategyOutcome::from_network(response, write))
    }

    /// Fetch first; on a failed fetch, serve the stored copy or the offline document.
    ///
    /// Every network response is returned as-is. Only a 200 is written back.
    pub async fn network_first(
        &self, request: &Request, store: &str, offline: OfflineDocument<'_>,
    ) -> Result<StrategyOutcome, Error> {
        let err = match self.network.fetch(request).await {
            Ok(response) => {
                let write = self.write_back_if_ok(store, request, &response);
                return Ok(StrategyOutcome::from_network(response, write));
            }
            Err(err) => err,
        };

        log_fetch_failure(request, &err);

        if let Some(cached) = self.lookup(store, request).await {
            return Ok(StrategyOutcome::from_cache(cached));
        }

        if let Some(document) = self.lookup(offline.store, offline.request).await {
            tracing::debug!("serving offline document {} for {}", offline.request.url, request.url);
            return Ok(StrategyOutcome::offline(document));
        }

        tracing::warn!(url = %request.url, "offline document not installed; serving placeholder");
        Ok(StrategyOutcome::offline(Response::offline_placeholder()))
    }

    /// Fetch; keep 200s in `store`, fall back to `store` for anything else.
    ///
    /// With nothing stored, a non-200 response is returned as-is and a
    /// network failure propagates.
    pub async fn network_only(&self, request: &Request, store: &str) -> Result<StrategyOutcome, Error> {
        match self.network.fetch(request).await {
            Ok(response) if response.is_ok_200() => {
                let write = self.write_back_if_ok(store, request, &response);
                Ok(StrategyOutcome::from_network(response, write))
            }
            Ok(response) => match self.lookup(store, request).await {
                Some(cached) => Ok(StrategyOutcome::from_cache(cached)),
                None => Ok(StrategyOutcome::from_network(response, None)),
            },
            Err(err) => {
                log_fetch_failure(request, &err);
                match self.lookup(store, request).await {
                    Some(cached) => Ok(StrategyOutcome::from_cache(cached)),
                    None => Err(err),
                }
            }
        }
    }

    /// Store lookup that treats a read error as a miss.
    async fn lookup(&self, store: &str, request: &Request) -> Option<Response> {
        if !is_cacheable(request) {
            return None;
        }
        match self.storage.store_get(store, request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(store = %store, url = %request.url, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    fn write_back_if_ok(&self, store: &str, request: &Request, response: &Response) -> Option<PendingWrite> {
        (is_cacheable(request) && response.is_ok_200())
            .then(|| PendingWrite::spawn(Arc::clone(&self.storage), store, request, response))
    }
}

fn is_cacheable(request: &Request) -> bool {
    request.method == "GET"
}

fn log_fetch_failure(request: &Request, err: &Error) {
    if err.is_network_failure() {
        tracing::debug!("network unavailable for {}: {}", request.url, err);
    } else {
        tracing::warn!(url = %request.url, error = %err, "fetch rejected");
    }
}
