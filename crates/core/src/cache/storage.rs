//! The persistent cache storage boundary.
//!
//! The worker talks to stores only through [`CacheStorage`], so the SQLite
//! backend can be swapped for a host-provided one (or a failing double in
//! tests) without touching strategy code.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::stores::EntryKey;
use crate::{Error, Request, Response};

/// Named, persistent request → response stores.
///
/// Each single `store_put` is atomic per key; there are no cross-key
/// transactions apart from [`CacheStorage::store_put_all`].
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store, creating it if absent.
    async fn open_store(&self, name: &str) -> Result<(), Error>;

    async fn has_store(&self, name: &str) -> Result<bool, Error>;

    async fn list_store_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a store. Returns whether it existed.
    async fn delete_store(&self, name: &str) -> Result<bool, Error>;

    async fn store_get(&self, store: &str, request: &Request) -> Result<Option<Response>, Error>;

    async fn store_put(&self, store: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// All-or-nothing batch write.
    async fn store_put_all(&self, store: &str, entries: Vec<(Request, Response)>) -> Result<(), Error>;

    async fn store_keys(&self, store: &str) -> Result<Vec<EntryKey>, Error>;

    async fn entry_count(&self, store: &str) -> Result<u64, Error>;

    /// Drop the oldest entries until at most `max_entries` remain.
    async fn trim_store(&self, store: &str, max_entries: usize) -> Result<u64, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_store(&self, name: &str) -> Result<(), Error> {
        CacheDb::open_store(self, name).await
    }

    async fn has_store(&self, name: &str) -> Result<bool, Error> {
        CacheDb::has_store(self, name).await
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        CacheDb::list_store_names(self).await
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_store(self, name).await
    }

    async fn store_get(&self, store: &str, request: &Request) -> Result<Option<Response>, Error> {
        CacheDb::store_get(self, store, request).await
    }

    async fn store_put(&self, store: &str, request: &Request, response: &Response) -> Result<(), Error> {
        CacheDb::store_put(self, store, request, response).await
    }

    async fn store_put_all(&self, store: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        CacheDb::store_put_all(self, store, entries).await
    }

    async fn store_keys(&self, store: &str) -> Result<Vec<EntryKey>, Error> {
        CacheDb::store_keys(self, store).await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        CacheDb::entry_count(self, store).await
    }

    async fn trim_store(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        CacheDb::trim_store(self, store, max_entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trait_object_roundtrip() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let request = Request::parse_get("https://example.com/").unwrap();
        let response = Response::new(200, vec![], "body");

        storage.store_put("s", &request, &response).await.unwrap();

        assert_eq!(storage.store_get("s", &request).await.unwrap(), Some(response));
        assert_eq!(storage.list_store_names().await.unwrap(), vec!["s".to_string()]);
    }
}
