//! Versioned cache store names.
//!
//! A store name is `{prefix}-{kind}-{version}`. Bumping the version yields a
//! fresh, empty set of stores; the previous generation is left untouched until
//! activation deletes it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every store this build owns.
pub const CACHE_PREFIX: &str = "harbor";

/// Version tag for the current build's stores.
pub const CACHE_VERSION: &str = "v1";

/// The logical cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Static,
    Dynamic,
    Tile,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Static, StoreKind::Dynamic, StoreKind::Tile];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Static => "static",
            StoreKind::Dynamic => "dynamic",
            StoreKind::Tile => "tile",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of store names considered current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStoreRegistry {
    static_store: String,
    dynamic_store: String,
    tile_store: String,
}

impl CacheStoreRegistry {
    pub fn new(prefix: &str, version: &str) -> Self {
        let name = |kind: StoreKind| format!("{prefix}-{kind}-{version}");
        Self {
            static_store: name(StoreKind::Static),
            dynamic_store: name(StoreKind::Dynamic),
            tile_store: name(StoreKind::Tile),
        }
    }

    /// Registry for the compiled-in prefix and version.
    pub fn current() -> Self {
        Self::new(CACHE_PREFIX, CACHE_VERSION)
    }

    pub fn name_of(&self, kind: StoreKind) -> &str {
        match kind {
            StoreKind::Static => &self.static_store,
            StoreKind::Dynamic => &self.dynamic_store,
            StoreKind::Tile => &self.tile_store,
        }
    }

    pub fn static_store(&self) -> &str {
        &self.static_store
    }

    pub fn dynamic_store(&self) -> &str {
        &self.dynamic_store
    }

    pub fn tile_store(&self) -> &str {
        &self.tile_store
    }

    /// All current names, in `StoreKind::ALL` order.
    pub fn names(&self) -> [&str; 3] {
        [&self.static_store, &self.dynamic_store, &self.tile_store]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

impl Default for CacheStoreRegistry {
    fn default() -> Self {
        Self::current()
    }
}
