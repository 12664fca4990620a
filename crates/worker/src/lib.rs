//! The harbor caching engine.
//!
//! Requests are classified by [`router`], served by one of the
//! [`strategy`] primitives against one versioned store, and the stores
//! themselves are populated and pruned by [`lifecycle`]. [`dispatch`] maps
//! host events onto these handlers.

pub mod clients;
pub mod dispatch;
pub mod lifecycle;
pub mod manifest;
pub mod notification;
pub mod router;
pub mod strategy;
pub mod sync;

#[cfg(test)]
mod testing;

pub use dispatch::{Event, Outcome, Worker, WorkerDeps};
pub use manifest::AppManifest;
