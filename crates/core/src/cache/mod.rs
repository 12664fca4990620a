//! SQLite-backed cache stores.
//!
//! This module provides persistent, named cache stores using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request-keyed storage using SHA-256 hashing of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascading store deletion and explicit oldest-first trimming

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::CacheStorage;
pub use stores::EntryKey;
