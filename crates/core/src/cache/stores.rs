//! Store and entry operations on the SQLite backend.
//!
//! A store is a row in `stores`; its entries cascade away with it. Entry
//! writes are upserts, so a second write for the same request overwrites the
//! first and the store never holds duplicate keys.

use super::connection::CacheDb;
use super::hash::request_key;
use crate::{Error, Request, Response};
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Transaction};

/// A stored entry's request identity, as listed by [`CacheDb::store_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub method: String,
    pub url: String,
}

struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn encode(request: &Request, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            key_hash: request_key(request),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: i64::from(response.status),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

fn ensure_store(tx: &Transaction<'_>, name: &str, now: &str) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, now],
    )?;
    Ok(())
}

fn upsert_entry(tx: &Transaction<'_>, store: &str, row: &EntryRow, now: &str) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO entries (store_name, key_hash, method, url, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(store_name, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![store, &row.key_hash, &row.method, &row.url, row.status, &row.headers_json, &row.body, now],
    )?;
    Ok(())
}

impl CacheDb {
    /// Open a store, creating it if absent. Idempotent.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every persisted store, sorted.
    pub async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns whether the store existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored for `request` in `store`.
    ///
    /// Returns None if either the store or the entry doesn't exist.
    pub async fn store_get(&self, store: &str, request: &Request) -> Result<Option<Response>, Error> {
        let store = store.to_string();
        let key_hash = request_key(request);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, headers_json, body FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                        params![store, key_hash],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                    )
                    .optional()?;

                let Some((status, headers_json, body)) = row else {
                    return Ok(None);
                };

                let status =
                    u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status} out of range")))?;
                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                Ok(Some(Response::new(status, headers, body)))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` under `request` in `store`, creating the store if needed.
    pub async fn store_put(&self, store: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.store_put_all(store, vec![(request.clone(), response.clone())]).await
    }

    /// Store a batch of entries in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn store_put_all(&self, store: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let store = store.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::encode(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store, &now)?;
                for row in &rows {
                    upsert_entry(&tx, &store, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Request identities stored in `store`, oldest first.
    pub async fn store_keys(&self, store: &str) -> Result<Vec<EntryKey>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url FROM entries WHERE store_name = ?1 ORDER BY stored_at ASC, rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![store], |row| Ok(EntryKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in `store`.
    pub async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store_name = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries of `store` until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_store(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        let store = store.to_string();
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store_name = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                    SELECT rowid FROM entries WHERE store_name = ?1
                    ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                )",
                    params![store, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
