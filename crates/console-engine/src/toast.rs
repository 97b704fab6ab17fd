//! Transient operator notifications
//!
//! The bus is owned by the application root and handed to every component
//! that reports outcomes; there is no global instance.

use crate::error::ConsoleError;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Toast identifier
pub type ToastId = u64;

/// Message shown to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    /// Headline, e.g. `User suspended`
    pub title: String,
    /// Optional detail
    pub description: Option<String>,
    /// Display time, bus default when absent
    #[serde(skip)]
    pub duration: Option<Duration>,
}

impl Toast {
    /// Toast with a title only
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            duration: None,
        }
    }

    /// Add a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the display time
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl From<&ConsoleError> for Toast {
    fn from(err: &ConsoleError) -> Self {
        Self::new(err.title()).with_description(err.to_string())
    }
}

/// Toast currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToast {
    /// Identifier
    pub id: ToastId,
    /// Content
    pub toast: Toast,
    expires_at: Instant,
}

type Handler = Arc<dyn Fn(&ActiveToast) + Send + Sync>;

struct BusInner {
    toasts: Mutex<Vec<ActiveToast>>,
    handlers: Mutex<Vec<(u64, Handler)>>,
    next_id: AtomicU64,
    default_duration: Duration,
}

/// Publish/subscribe channel for toasts
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("active", &self.inner.toasts.lock().len())
            .field("subscribers", &self.inner.handlers.lock().len())
            .field("default_duration", &self.inner.default_duration)
            .finish()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000))
    }
}

impl NotificationBus {
    /// Bus whose toasts expire after `default_duration` unless overridden
    pub fn new(default_duration: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                toasts: Mutex::new(Vec::new()),
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                default_duration,
            }),
        }
    }

    /// Show a toast and notify every subscriber
    ///
    /// Expired toasts are dropped on every publish, not only in [`Self::active`].
    pub fn publish(&self, toast: Toast) -> ToastId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let duration = toast.duration.unwrap_or(self.inner.default_duration);
        let now = Instant::now();
        let active = ActiveToast {
            id,
            toast,
            expires_at: now + duration,
        };
        info!(
            id,
            title = %active.toast.title,
            description = active.toast.description.as_deref().unwrap_or_default(),
            "Toast"
        );

        {
            let mut toasts = self.inner.toasts.lock();
            toasts.retain(|t| t.expires_at > now);
            toasts.push(active.clone());
        }
        let handlers: Vec<Handler> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&active);
        }
        id
    }

    /// Publish the toast for a failed operation
    pub fn publish_error(&self, err: &ConsoleError) -> ToastId {
        self.publish(Toast::from(err))
    }

    /// Register `handler` for every future toast
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ActiveToast) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.lock().push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Unexpired toasts, oldest first
    pub fn active(&self) -> Vec<ActiveToast> {
        let now = Instant::now();
        let mut toasts = self.inner.toasts.lock();
        toasts.retain(|t| t.expires_at > now);
        toasts.clone()
    }

    /// Remove a toast before it expires
    pub fn dismiss(&self, id: ToastId) -> bool {
        let mut toasts = self.inner.toasts.lock();
        let before = toasts.len();
        toasts.retain(|t| t.id != id);
        toasts.len() != before
    }
}

/// Handle that detaches its handler when dropped
#[derive(Debug)]
#[must_use = "dropping a subscription detaches the handler"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    /// Detach now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_toasts_expire_after_default_duration() {
        let bus = NotificationBus::default();
        bus.publish(Toast::new("Logged in"));

        tokio::time::advance(Duration::from_millis(2999)).await;
        assert_eq!(bus.active().len(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(bus.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_duration() {
        let bus = NotificationBus::new(Duration::from_secs(1));
        bus.publish(Toast::new("short"));
        bus.publish(Toast::new("long").with_duration(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(2)).await;
        let active = bus.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].toast.title, "long");
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_drops_expired_toasts() {
        let bus = NotificationBus::new(Duration::from_secs(1));
        for n in 0..50 {
            bus.publish(Toast::new(format!("Export {n} ready")));
            tokio::time::advance(Duration::from_millis(400)).await;
        }

        let retained = bus.inner.toasts.lock().len();
        assert!(retained <= 3, "retained {retained} toasts");
        assert_eq!(bus.active().last().unwrap().toast.title, "Export 49 ready");
    }

    #[test]
    fn test_subscribers_receive_until_dropped() {
        let bus = NotificationBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |t| seen.lock().push(t.toast.title.clone()))
        };
        bus.publish(Toast::new("User suspended"));
        subscription.unsubscribe();
        bus.publish(Toast::new("User activated"));

        assert_eq!(*seen.lock(), vec!["User suspended".to_string()]);
    }

    #[test]
    fn test_error_toast_and_dismiss() {
        let bus = NotificationBus::default();
        let id = bus.publish_error(&ConsoleError::mutation("u_3", "write rejected"));

        let active = bus.active();
        assert_eq!(active[0].toast.title, "Update failed");
        assert_eq!(
            active[0].toast.description.as_deref(),
            Some("Update of u_3 failed: write rejected")
        );
        assert!(bus.dismiss(id));
        assert!(!bus.dismiss(id));
    }
}
