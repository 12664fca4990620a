//! Test doubles for the network and storage boundaries.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use harbor_client::Network;
use harbor_core::cache::EntryKey;
use harbor_core::{CacheDb, CacheStorage, Error, Request, Response};

/// Network double answering from a URL table.
///
/// Unknown URLs answer 404. While offline every fetch fails with
/// `Error::Network`.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, vec![], "not found")))
    }
}

pub(crate) fn ok(body: &str) -> Response {
    Response::new(200, vec![("content-type".into(), "text/html".into())], body.to_string())
}

/// Storage double over an in-memory database that can be told to fail
/// deletes of specific stores, or every write.
pub(crate) struct FlakyStorage {
    inner: CacheDb,
    failing_deletes: Mutex<HashSet<String>>,
    fail_puts: AtomicBool,
}

impl FlakyStorage {
    pub(crate) async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            failing_deletes: Mutex::new(HashSet::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_delete_of(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open_store(&self, name: &str) -> Result<(), Error> {
        self.inner.open_store(name).await
    }

    async fn has_store(&self, name: &str) -> Result<bool, Error> {
        self.inner.has_store(name).await
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.inner.list_store_names().await
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(Error::InvalidInput(format!("store {name} is locked")));
        }
        self.inner.delete_store(name).await
    }

    async fn store_get(&self, store: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.inner.store_get(store, request).await
    }

    async fn store_put(&self, store: &str, request: &Request, response: &Response) -> Result<(), Error> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("quota exceeded".into()));
        }
        self.inner.store_put(store, request, response).await
    }

    async fn store_put_all(&self, store: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("quota exceeded".into()));
        }
        self.inner.store_put_all(store, entries).await
    }

    async fn store_keys(&self, store: &str) -> Result<Vec<EntryKey>, Error> {
        self.inner.store_keys(store).await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        self.inner.entry_count(store).await
    }

    async fn trim_store(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        self.inner.trim_store(store, max_entries).await
    }
}
