//! Push messages, notifications and the clients they open.
//!
//! A push payload is parsed into a [`PushPayload`], turned into a
//! [`Notification`] using the configured [`NotificationDefaults`], and shown
//! through the [`NotificationCenter`], which keeps it until it is closed.

mod clients;

pub use clients::{Client, ClientRegistry};

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::NotificationDefaults;

/// Action id that opens (or focuses) the application.
pub const ACTION_OPEN: &str = "open";
/// Action id that only dismisses the notification.
pub const ACTION_DISMISS: &str = "dismiss";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("push payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Delivery priority carried in a push payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Stays on screen until the user interacts with it.
    High,
    /// Shown without sound or vibration.
    Low,
    #[default]
    Normal,
}

impl Priority {
    /// Anything other than `high` or `low` is normal priority.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("high") => Self::High,
            Some("low") => Self::Low,
            _ => Self::Normal,
        }
    }
}

/// The JSON body of a push message. Every field is optional.
///
/// Fields of the wrong type, and empty strings, count as absent.
#[derive(Debug, Clone, Default)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub data: Option<serde_json::Value>,
    pub priority: Option<String>,
}

impl PushPayload {
    /// Fails only when `bytes` is not JSON at all.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NotifyError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            title: text("title"),
            body: text("body"),
            icon: text("icon"),
            badge: text("badge"),
            data: value.get("data").filter(|d| !d.is_null()).cloned(),
            priority: text("priority"),
        }
    }

    pub fn priority(&self) -> Priority {
        Priority::parse(self.priority.as_deref())
    }

    /// Builds the notification to display, filling gaps from `defaults`.
    pub fn into_notification(self, defaults: &NotificationDefaults) -> Notification {
        let priority = self.priority();
        Notification {
            title: self.title.unwrap_or_else(|| defaults.title.clone()),
            body: self.body.unwrap_or_else(|| defaults.body.clone()),
            icon: self.icon.unwrap_or_else(|| defaults.icon.clone()),
            badge: self.badge.unwrap_or_else(|| defaults.badge.clone()),
            data: self
                .data
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            actions: vec![
                NotificationAction::new(ACTION_OPEN, &defaults.open_action_title),
                NotificationAction::new(ACTION_DISMISS, &defaults.dismiss_action_title),
            ],
            require_interaction: priority == Priority::High,
            silent: priority == Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: serde_json::Value,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
    pub silent: bool,
}

/// A notification currently on display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShownNotification {
    pub id: u64,
    pub shown_at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// A click on a notification, or on one of its action buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationClick {
    /// Which notification was clicked, if known.
    pub notification_id: Option<u64>,
    /// The action button, or `None` for a click on the notification body.
    pub action: Option<String>,
}

impl NotificationClick {
    pub fn is_open(&self) -> bool {
        self.action.as_deref() == Some(ACTION_OPEN)
    }
}

/// Displayed notifications, kept until closed.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    next_id: AtomicU64,
    shown: RwLock<Vec<ShownNotification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displays `notification` and returns its id.
    pub async fn show(&self, notification: Notification) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            id,
            title = %notification.title,
            require_interaction = notification.require_interaction,
            silent = notification.silent,
            "showing notification"
        );
        self.shown.write().await.push(ShownNotification {
            id,
            shown_at: Utc::now(),
            notification,
        });
        id
    }

    /// Closes the notification with `id`, returning it if it was open.
    pub async fn close(&self, id: u64) -> Option<ShownNotification> {
        let mut shown = self.shown.write().await;
        let index = shown.iter().position(|n| n.id == id)?;
        Some(shown.remove(index))
    }

    pub async fn list(&self) -> Vec<ShownNotification> {
        self.shown.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_fields_override_defaults() {
        let payload = PushPayload::from_slice(
            br#"{"title":"EUR/USD","body":"Breakout","icon":"/i.png","data":{"pair":"EURUSD"}}"#,
        )
        .unwrap();
        let n = payload.into_notification(&NotificationDefaults::default());
        assert_eq!(n.title, "EUR/USD");
        assert_eq!(n.body, "Breakout");
        assert_eq!(n.icon, "/i.png");
        assert_eq!(n.badge, "/icon-96.png");
        assert_eq!(n.data["pair"], "EURUSD");
    }

    #[test]
    fn empty_payload_uses_defaults() {
        let n = PushPayload::from_slice(b"{}")
            .unwrap()
            .into_notification(&NotificationDefaults::default());
        assert_eq!(n.title, "Forex Academy");
        assert_eq!(n.body, "Nueva actualización disponible");
        assert_eq!(n.data, serde_json::json!({}));
        let actions: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["open", "dismiss"]);
        assert!(!n.require_interaction);
        assert!(!n.silent);
    }

    #[test]
    fn priority_drives_flags() {
        let defaults = NotificationDefaults::default();
        let high = PushPayload::from_slice(br#"{"priority":"high"}"#)
            .unwrap()
            .into_notification(&defaults);
        assert!(high.require_interaction && !high.silent);

        let low = PushPayload::from_slice(br#"{"priority":"low"}"#)
            .unwrap()
            .into_notification(&defaults);
        assert!(low.silent && !low.require_interaction);

        assert_eq!(Priority::parse(Some("urgent")), Priority::Normal);
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let defaults = NotificationDefaults::default();
        let n = PushPayload::from_slice(br#"{"title":"EURUSD","priority":1,"body":42}"#)
            .unwrap()
            .into_notification(&defaults);
        assert_eq!(n.title, "EURUSD");
        assert_eq!(n.body, defaults.body);
        assert!(!n.require_interaction && !n.silent);
    }

    #[test]
    fn non_object_payload_shows_defaults() {
        let defaults = NotificationDefaults::default();
        let payloads: [&[u8]; 4] = [b"[1,2]", b"\"breaking\"", b"7", b"null"];
        for raw in payloads {
            let n = PushPayload::from_slice(raw)
                .unwrap()
                .into_notification(&defaults);
            assert_eq!(n.title, defaults.title);
            assert_eq!(n.data, serde_json::json!({}));
        }
    }

    #[test]
    fn empty_strings_use_defaults() {
        let defaults = NotificationDefaults::default();
        let n = PushPayload::from_slice(br#"{"title":"","body":"","priority":""}"#)
            .unwrap()
            .into_notification(&defaults);
        assert_eq!(n.title, "Forex Academy");
        assert_eq!(n.body, "Nueva actualización disponible");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(PushPayload::from_slice(b"not json").is_err());
    }

    #[tokio::test]
    async fn center_assigns_ids_and_closes() {
        let center = NotificationCenter::new();
        let n = PushPayload::default().into_notification(&NotificationDefaults::default());
        let first = center.show(n.clone()).await;
        let second = center.show(n).await;
        assert_ne!(first, second);
        assert_eq!(center.list().await.len(), 2);

        assert_eq!(center.close(first).await.map(|s| s.id), Some(first));
        assert!(center.close(first).await.is_none());
        assert_eq!(center.list().await.len(), 1);
    }
}
