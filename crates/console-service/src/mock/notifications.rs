//! Mock cursor-paginated notification feed

use super::{CallCounters, simulate_latency};
use crate::error::ServiceResult;
use crate::service::NotificationService;
use crate::types::{Ack, NotificationDraft, NotificationPage, NotificationQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use console_core::NotificationItem;
use console_core::types::{NotificationType, Severity};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const FIRST_PUSHED_ID: u64 = 1000;

/// Mock notification feed
#[derive(Debug, Clone)]
pub struct MockNotificationService {
    items: Arc<Mutex<Vec<NotificationItem>>>,
    next_id: Arc<AtomicU64>,
    latency_ms: u64,
    calls: CallCounters,
}

impl MockNotificationService {
    /// Create a feed holding `items`
    pub fn new(items: Vec<NotificationItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            next_id: Arc::new(AtomicU64::new(FIRST_PUSHED_ID)),
            latency_ms: 0,
            calls: CallCounters::default(),
        }
    }

    /// Create a feed seeded with the generated notifications
    pub fn seeded(seed: u64, now: DateTime<Utc>) -> Self {
        Self::new(super::dataset::Dataset::generate(seed, now).notifications)
    }

    /// Set simulated latency for every call
    pub const fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Number of calls made to `operation` so far
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.get(operation)
    }

    /// Copy of every stored notification
    pub fn all(&self) -> Vec<NotificationItem> {
        self.items.lock().clone()
    }

    async fn enter(&self, operation: &'static str) {
        self.calls.record(operation);
        debug!(operation, "Mock notification call");
        simulate_latency(self.latency_ms).await;
    }
}

fn matches(item: &NotificationItem, query: &NotificationQuery) -> bool {
    if query.unread && item.read {
        return false;
    }
    if query.kind.is_some_and(|kind| item.kind != kind) {
        return false;
    }
    match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let q = q.to_lowercase();
            item.title.to_lowercase().contains(&q)
                || item
                    .body
                    .as_deref()
                    .is_some_and(|body| body.to_lowercase().contains(&q))
        }
        None => true,
    }
}

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn list(&self, query: &NotificationQuery) -> ServiceResult<NotificationPage> {
        self.enter("list").await;

        let mut matching: Vec<NotificationItem> = self
            .items
            .lock()
            .iter()
            .filter(|item| matches(item, query))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        // An unknown cursor restarts from the newest item.
        let start = query
            .cursor
            .as_deref()
            .and_then(|cursor| matching.iter().position(|item| item.id == cursor))
            .map_or(0, |index| index + 1);
        let end = start.saturating_add(query.limit).min(matching.len());
        let items = matching[start.min(end)..end].to_vec();

        let next_cursor = if end < matching.len() {
            items.last().map(|item| item.id.clone())
        } else {
            None
        };

        Ok(NotificationPage { items, next_cursor })
    }

    async fn mark_read(&self, id: &str) -> ServiceResult<Ack> {
        self.enter("mark_read").await;
        for item in self.items.lock().iter_mut().filter(|item| item.id == id) {
            item.read = true;
        }
        Ok(Ack { ok: true })
    }

    async fn mark_all_read(&self) -> ServiceResult<Ack> {
        self.enter("mark_all_read").await;
        for item in self.items.lock().iter_mut() {
            item.read = true;
        }
        Ok(Ack { ok: true })
    }

    async fn push(&self, draft: NotificationDraft) -> ServiceResult<NotificationItem> {
        self.enter("push").await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = NotificationItem {
            id: format!("n_{id}"),
            title: draft.title.unwrap_or_else(|| "System update".to_string()),
            body: Some(
                draft
                    .body
                    .unwrap_or_else(|| "Background task completed".to_string()),
            ),
            created_at: Utc::now(),
            read: false,
            kind: draft.kind.unwrap_or(NotificationType::System),
            severity: draft.severity.unwrap_or(Severity::Info),
            link: draft.link,
        };
        self.items.lock().insert(0, item.clone());

        Ok(item)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed() -> MockNotificationService {
        MockNotificationService::seeded(42, Utc::now())
    }

    #[tokio::test]
    async fn test_first_page_newest_first() {
        let feed = feed();
        let page = feed.list(&NotificationQuery::default()).await.unwrap();

        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, "n_0");
        assert_eq!(page.next_cursor.as_deref(), Some("n_9"));
    }

    #[tokio::test]
    async fn test_last_page_has_no_cursor() {
        let feed = feed();
        let query = NotificationQuery::default().after(Some("n_9".to_string()));
        let page = feed.list(&query).await.unwrap();

        assert_eq!(page.items.len(), 8);
        assert_eq!(page.items[0].id, "n_10");
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_without_cursor() {
        let feed = feed();
        let query = NotificationQuery {
            limit: 6,
            unread: true,
            ..NotificationQuery::default()
        };

        let page = feed.list(&query).await.unwrap();
        assert_eq!(page.items.len(), 6);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_filters() {
        let feed = feed();
        let query = NotificationQuery {
            kind: Some(NotificationType::Report),
            limit: 50,
            ..NotificationQuery::default()
        };
        let page = feed.list(&query).await.unwrap();
        assert_eq!(page.items.len(), 3);

        let query = NotificationQuery {
            q: Some("PAYMENT FAILED".to_string()),
            limit: 50,
            ..NotificationQuery::default()
        };
        let page = feed.list(&query).await.unwrap();
        assert!(page.items.iter().all(|n| n.title == "Payment failed"));
    }

    #[tokio::test]
    async fn test_mark_read() {
        let feed = feed();

        feed.mark_read("n_0").await.unwrap();
        assert!(feed.all().iter().find(|n| n.id == "n_0").unwrap().read);

        feed.mark_all_read().await.unwrap();
        assert!(feed.all().iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn test_push_prepends_with_defaults() {
        let feed = feed();
        let item = feed.push(NotificationDraft::default()).await.unwrap();

        assert_eq!(item.id, "n_1000");
        assert_eq!(item.title, "System update");
        assert_eq!(item.kind, NotificationType::System);

        let page = feed.list(&NotificationQuery::default()).await.unwrap();
        assert_eq!(page.items[0].id, "n_1000");
    }
}
