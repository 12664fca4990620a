//! Host-side window and notification surfaces.
//!
//! The worker never owns windows or a notification tray; it asks the host.
//! [`WindowRegistry`] and [`LogNotifier`] are the in-process hosts used by the
//! `harbor` binary.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use harbor_core::Error;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::notification::NotificationIntent;

/// A window controlled (or controllable) by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowClient {
    pub id: String,
    pub url: Url,
    pub focused: bool,
    pub controlled: bool,
}

#[async_trait]
pub trait Clients: Send + Sync {
    /// Take control of every open window. Returns the number claimed.
    async fn claim(&self) -> Result<usize, Error>;

    async fn windows(&self) -> Result<Vec<WindowClient>, Error>;

    async fn focus(&self, id: &str) -> Result<WindowClient, Error>;

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, intent: &NotificationIntent) -> Result<(), Error>;

    async fn close(&self, tag: &str) -> Result<(), Error>;
}

/// In-memory window table.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: RwLock<Vec<WindowClient>>,
    next_id: AtomicU64,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-open, uncontrolled window.
    pub async fn attach(&self, url: Url) -> WindowClient {
        let window = WindowClient { id: self.allocate_id(), url, focused: false, controlled: false };
        self.windows.write().await.push(window.clone());
        window
    }

    fn allocate_id(&self) -> String {
        format!("window-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl Clients for WindowRegistry {
    async fn claim(&self) -> Result<usize, Error> {
        let mut windows = self.windows.write().await;
        let mut claimed = 0;
        for window in windows.iter_mut().filter(|w| !w.controlled) {
            window.controlled = true;
            claimed += 1;
        }
        Ok(claimed)
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.windows.read().await.clone())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient, Error> {
        let mut windows = self.windows.write().await;
        if !windows.iter().any(|w| w.id == id) {
            return Err(Error::Client(format!("no window with id {id}")));
        }
        let mut focused = None;
        for window in windows.iter_mut() {
            window.focused = window.id == id;
            if window.focused {
                focused = Some(window.clone());
            }
        }
        focused.ok_or_else(|| Error::Client(format!("no window with id {id}")))
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error> {
        let window = WindowClient { id: self.allocate_id(), url: url.clone(), focused: true, controlled: true };
        let mut windows = self.windows.write().await;
        for other in windows.iter_mut() {
            other.focused = false;
        }
        windows.push(window.clone());
        Ok(window)
    }
}

/// Notifier that records intents in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, intent: &NotificationIntent) -> Result<(), Error> {
        tracing::info!(title = %intent.title, body = %intent.body, url = %intent.url, "notification shown");
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), Error> {
        tracing::debug!("notification {} closed", tag);
        Ok(())
    }
}
