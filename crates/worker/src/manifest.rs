//! Compiled-in application manifest.
//!
//! Paths are relative to the application scope and resolved against it once,
//! at startup. Classification compares request paths against the resolved
//! paths; install fetches the resolved URLs.

use harbor_core::Error;
use url::Url;

/// Assets pre-cached on install. Includes the entry point and the icon set.
pub const STATIC_ASSETS: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.json",
    "./icons/icon-72x72.png",
    "./icons/icon-96x96.png",
    "./icons/icon-128x128.png",
    "./icons/icon-144x144.png",
    "./icons/icon-152x152.png",
    "./icons/icon-192x192.png",
    "./icons/icon-384x384.png",
    "./icons/icon-512x512.png",
];

/// Any path under these prefixes is treated as a static asset.
pub const STATIC_PREFIXES: &[&str] = &["./icons/"];

/// Third-party hosts whose traffic is cached in the tile store.
pub const TILE_HOSTS: &[&str] = &["maps.googleapis.com", "google-analytics.com"];

/// Page served when a navigation cannot be answered at all.
pub const ENTRY_POINT: &str = "./index.html";

pub const NOTIFICATION_ICON: &str = "./icons/icon-192x192.png";
pub const NOTIFICATION_BADGE: &str = "./icons/icon-72x72.png";

/// The manifest resolved against a concrete scope.
#[derive(Debug, Clone)]
pub struct AppManifest {
    scope: Url,
    assets: Vec<Url>,
    static_prefixes: Vec<String>,
    tile_hosts: Vec<String>,
    entry_point: Url,
}

impl AppManifest {
    /// Resolve the compiled-in tables against `scope`.
    pub fn builtin(scope: &Url) -> Result<Self, Error> {
        Self::new(scope, STATIC_ASSETS, STATIC_PREFIXES, TILE_HOSTS, ENTRY_POINT)
    }

    pub fn new(
        scope: &Url, assets: &[&str], static_prefixes: &[&str], tile_hosts: &[&str], entry_point: &str,
    ) -> Result<Self, Error> {
        let assets = assets
            .iter()
            .map(|path| resolve(scope, path))
            .collect::<Result<Vec<_>, _>>()?;
        let static_prefixes = static_prefixes
            .iter()
            .map(|prefix| resolve(scope, prefix).map(|url| url.path().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            scope: scope.clone(),
            assets,
            static_prefixes,
            tile_hosts: tile_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            entry_point: resolve(scope, entry_point)?,
        })
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    /// Absolute URLs of every asset to pre-cache.
    pub fn assets(&self) -> &[Url] {
        &self.assets
    }

    pub fn entry_point(&self) -> &Url {
        &self.entry_point
    }

    /// Resolve a scope-relative path (or absolute URL) against the scope.
    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        resolve(&self.scope, path)
    }

    /// Exact manifest path, or under a static prefix.
    pub fn is_static_path(&self, path: &str) -> bool {
        self.assets.iter().any(|asset| asset.path() == path)
            || self.static_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Host equals an allow-listed host or is a subdomain of one.
    pub fn is_tile_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.tile_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

fn resolve(scope: &Url, path: &str) -> Result<Url, Error> {
    scope
        .join(path)
        .map_err(|e| Error::InvalidUrl(format!("{path} against {scope}: {e}")))
}
