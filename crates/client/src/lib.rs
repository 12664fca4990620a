//! Network access for harbor.
//!
//! This crate provides the [`Network`] boundary the caching strategies fetch
//! through, its reqwest-backed implementation, and URL canonicalization so
//! equal resources produce equal cache keys.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, canonicalize};
