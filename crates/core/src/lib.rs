//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Cache store implementation with SQLite backend
//! - Versioned store registry
//! - Request and response snapshots
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod registry;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response};
pub use registry::{CacheStoreRegistry, StoreKind};
