//! Push payload rendering and notification click handling.

use std::sync::Arc;

use harbor_core::Error;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::clients::{Clients, Notifier, WindowClient};
use crate::manifest::{AppManifest, NOTIFICATION_BADGE, NOTIFICATION_ICON};

pub const DEFAULT_BODY: &str = "New updates available";
pub const DEFAULT_TAG: &str = "harbor-push";
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Fields a push payload may carry. All optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub tag: Option<String>,
}

impl PushPayload {
    /// Parse a push body. Missing or malformed data yields the empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.iter().all(u8::is_ascii_whitespace)) else {
            return Self::default();
        };
        match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "push payload is not valid JSON; using defaults");
                Self::default()
            }
        }
    }
}

/// What to show for one push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    pub icon: Url,
    pub badge: Url,
    pub vibrate: Vec<u32>,
    pub url: Url,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickOutcome {
    Focused { window: WindowClient },
    Opened { window: WindowClient },
}

pub struct NotificationDispatcher {
    manifest: AppManifest,
    app_name: String,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
}

impl NotificationDispatcher {
    pub fn new(
        manifest: AppManifest, app_name: impl Into<String>, notifier: Arc<dyn Notifier>, clients: Arc<dyn Clients>,
    ) -> Self {
        Self { manifest, app_name: app_name.into(), notifier, clients }
    }

    /// Fill in defaults for a payload.
    pub fn render(&self, payload: PushPayload) -> Result<NotificationIntent, Error> {
        let url = match payload.url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(raw) => self.manifest.resolve(raw.trim()).unwrap_or_else(|e| {
                tracing::warn!(url = raw, error = %e, "push url unusable; using entry point");
                self.manifest.entry_point().clone()
            }),
            None => self.manifest.entry_point().clone(),
        };

        Ok(NotificationIntent {
            title: non_empty(payload.title).unwrap_or_else(|| self.app_name.clone()),
            body: non_empty(payload.body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: self.manifest.resolve(NOTIFICATION_ICON)?,
            badge: self.manifest.resolve(NOTIFICATION_BADGE)?,
            vibrate: VIBRATE_PATTERN.to_vec(),
            url,
            tag: non_empty(payload.tag).unwrap_or_else(|| DEFAULT_TAG.to_string()),
        })
    }

    /// Render and show a notification for a push event.
    pub async fn push(&self, data: Option<&[u8]>) -> Result<NotificationIntent, Error> {
        let intent = self.render(PushPayload::parse(data))?;
        self.notifier.show(&intent).await?;
        Ok(intent)
    }

    /// Close the notification, then focus a window already at `url` or open one.
    pub async fn click(&self, tag: Option<&str>, url: &Url) -> Result<ClickOutcome, Error> {
        self.notifier.close(tag.unwrap_or(DEFAULT_TAG)).await?;

        let windows = self.clients.windows().await?;
        if let Some(existing) = windows.iter().find(|w| w.url == *url) {
            let window = self.clients.focus(&existing.id).await?;
            tracing::debug!("focused {} for {}", window.id, url);
            return Ok(ClickOutcome::Focused { window });
        }

        let window = self.clients.open_window(url).await?;
        tracing::debug!("opened {} for {}", window.id, url);
        Ok(ClickOutcome::Opened { window })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::WindowRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<NotificationIntent>>,
        closed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn show(&self, intent: &NotificationIntent) -> Result<(), Error> {
            self.shown.lock().unwrap().push(intent.clone());
            Ok(())
        }

        async fn close(&self, tag: &str) -> Result<(), Error> {
            self.closed.lock().unwrap().push(tag.to_string());
            Ok(())
        }
    }

    fn dispatcher() -> (NotificationDispatcher, Arc<RecordingNotifier>, Arc<WindowRegistry>) {
        let manifest = AppManifest::builtin(&Url::parse("http://app.test/").unwrap()).unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let windows = Arc::new(WindowRegistry::new());
        (
            NotificationDispatcher::new(manifest, "Pin Point", notifier.clone(), windows.clone()),
            notifier,
            windows,
        )
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(PushPayload::parse(None), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"  ".as_slice())), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"not json".as_slice())), PushPayload::default());

        let payload = PushPayload::parse(Some(br#"{"title":"New pin","url":"/pins/7"}"#.as_slice()));
        assert_eq!(payload.title.as_deref(), Some("New pin"));
        assert_eq!(payload.url.as_deref(), Some("/pins/7"));
        assert!(payload.body.is_none());
    }

    #[tokio::test]
    async fn test_push_defaults() {
        let (dispatcher, notifier, _) = dispatcher();

        let intent = dispatcher.push(None).await.unwrap();

        assert_eq!(intent.title, "Pin Point");
        assert_eq!(intent.body, DEFAULT_BODY);
        assert_eq!(intent.url.as_str(), "http://app.test/index.html");
        assert_eq!(intent.icon.as_str(), "http://app.test/icons/icon-192x192.png");
        assert_eq!(intent.badge.as_str(), "http://app.test/icons/icon-72x72.png");
        assert_eq!(intent.vibrate, vec![100, 50, 100]);
        assert_eq!(notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_payload_overrides() {
        let (dispatcher, _, _) = dispatcher();

        let intent = dispatcher
            .push(Some(br#"{"title":"Track saved","body":"3.2 km","url":"./tracks/9"}"#.as_slice()))
            .await
            .unwrap();

        assert_eq!(intent.title, "Track saved");
        assert_eq!(intent.body, "3.2 km");
        assert_eq!(intent.url.as_str(), "http://app.test/tracks/9");
    }

    #[tokio::test]
    async fn test_click_focuses_matching_window() {
        let (dispatcher, notifier, windows) = dispatcher();
        let target = Url::parse("http://app.test/pins").unwrap();
        windows.attach(Url::parse("http://app.test/").unwrap()).await;
        let existing = windows.attach(target.clone()).await;

        let outcome = dispatcher.click(None, &target).await.unwrap();

        match outcome {
            ClickOutcome::Focused { window } => assert_eq!(window.id, existing.id),
            other => panic!("expected focus, got {other:?}"),
        }
        assert_eq!(notifier.closed.lock().unwrap().as_slice(), [DEFAULT_TAG.to_string()]);
        assert_eq!(windows.windows().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_click_opens_window_when_none_match() {
        let (dispatcher, _, windows) = dispatcher();
        windows.attach(Url::parse("http://app.test/").unwrap()).await;
        let target = Url::parse("http://app.test/tracks").unwrap();

        let outcome = dispatcher.click(Some("t1"), &target).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::Opened { ref window } if window.url == target));
        assert_eq!(windows.windows().await.unwrap().len(), 2);
    }
}
