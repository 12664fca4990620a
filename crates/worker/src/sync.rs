//! Deferred background sync.
//!
//! The upload logic lives outside this crate. [`StubSyncBackend`] stands in for
//! it: it logs the work and resolves after a short delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harbor_core::Error;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncTag {
    SyncPins,
    SyncTracks,
}

impl SyncTag {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "sync-pins" => Some(SyncTag::SyncPins),
            "sync-tracks" => Some(SyncTag::SyncTracks),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTag::SyncPins => "sync-pins",
            SyncTag::SyncTracks => "sync-tracks",
        }
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait SyncBackend: Send + Sync {
    async fn upload(&self, tag: SyncTag) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct StubSyncBackend {
    delay: Duration,
}

impl StubSyncBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for StubSyncBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl SyncBackend for StubSyncBackend {
    async fn upload(&self, tag: SyncTag) -> Result<(), Error> {
        tracing::info!(tag = %tag, "syncing pending records");
        tokio::time::sleep(self.delay).await;
        tracing::info!(tag = %tag, "sync complete");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed { tag: SyncTag, finished_at: DateTime<Utc> },
    Ignored { tag: String },
}

#[derive(Clone)]
pub struct DeferredSync {
    backend: Arc<dyn SyncBackend>,
}

impl DeferredSync {
    pub fn new(backend: Arc<dyn SyncBackend>) -> Self {
        Self { backend }
    }

    /// Run the upload registered under `tag`. Unknown tags are ignored.
    pub async fn handle(&self, tag: &str) -> Result<SyncOutcome, Error> {
        let Some(known) = SyncTag::parse(tag) else {
            tracing::debug!("ignoring unknown sync tag {}", tag);
            return Ok(SyncOutcome::Ignored { tag: tag.to_string() });
        };
        self.backend.upload(known).await?;
        Ok(SyncOutcome::Completed { tag: known, finished_at: Utc::now() })
    }
}
