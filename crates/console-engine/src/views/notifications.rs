//! Operator notification feed
//!
//! Cursor-paginated, polled in the background. The feed is a cloneable
//! handle so the polling task and the foreground share one list.

use super::ViewContext;
use crate::error::Result;
use console_core::NotificationItem;
use console_core::config::NotificationConfig;
use console_core::types::NotificationType;
use console_service::{NotificationPage, NotificationQuery, NotificationService};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feed filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilters {
    /// Only unread items
    pub unread: bool,
    /// Case-insensitive match on title or body
    pub q: Option<String>,
    /// Category, `None` for all
    pub kind: Option<NotificationType>,
}

#[derive(Debug, Default)]
struct FeedState {
    items: Vec<NotificationItem>,
    next_cursor: Option<String>,
    filters: FeedFilters,
    // Bumped when the filters change; a refresh started under older
    // filters is dropped.
    filter_generation: u64,
    // Bumped whenever `items` is replaced or extended; a page fetched
    // against an older list is dropped.
    list_generation: u64,
}

/// Notification feed handle
#[derive(Clone)]
pub struct NotificationFeed {
    service: Arc<dyn NotificationService>,
    config: NotificationConfig,
    state: Arc<Mutex<FeedState>>,
}

impl std::fmt::Debug for NotificationFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NotificationFeed")
            .field("items", &state.items.len())
            .field("next_cursor", &state.next_cursor)
            .field("filters", &state.filters)
            .finish_non_exhaustive()
    }
}

impl NotificationFeed {
    /// Feed over `service`
    pub fn new(service: Arc<dyn NotificationService>, config: NotificationConfig) -> Self {
        Self {
            service,
            config,
            state: Arc::new(Mutex::new(FeedState::default())),
        }
    }

    /// Feed over the context's notification service
    pub fn from_context(ctx: &ViewContext) -> Self {
        Self::new(Arc::clone(&ctx.notifications), ctx.config.notifications.clone())
    }

    fn query(&self, filters: &FeedFilters, cursor: Option<String>) -> NotificationQuery {
        NotificationQuery {
            cursor,
            limit: self.config.page_limit,
            unread: filters.unread,
            q: filters.q.clone(),
            kind: filters.kind,
        }
    }

    /// Current filters
    pub fn filters(&self) -> FeedFilters {
        self.state.lock().filters.clone()
    }

    /// Replace the filters and drop the loaded list
    pub fn set_filters(&self, filters: FeedFilters) {
        let mut state = self.state.lock();
        if state.filters != filters {
            state.filters = filters;
            state.items.clear();
            state.next_cursor = None;
            state.filter_generation += 1;
            state.list_generation += 1;
        }
    }

    /// Reload the first page
    ///
    /// Returns the number of items loaded, 0 when the result was dropped
    /// because the filters changed meanwhile.
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn refresh(&self) -> Result<usize> {
        let (query, generation) = {
            let state = self.state.lock();
            (self.query(&state.filters, None), state.filter_generation)
        };
        let page = self.service.list(&query).await?;

        let mut state = self.state.lock();
        if state.filter_generation != generation {
            debug!("Dropping feed page fetched under old filters");
            return Ok(0);
        }
        let count = page.items.len();
        state.items = page.items;
        state.next_cursor = page.next_cursor;
        state.list_generation += 1;
        Ok(count)
    }

    /// Append the next page
    ///
    /// Returns `false` when nothing more matches or the list changed while
    /// the page was in flight.
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load_more(&self) -> Result<bool> {
        let (query, generation) = {
            let state = self.state.lock();
            let Some(cursor) = state.next_cursor.clone() else {
                return Ok(false);
            };
            (self.query(&state.filters, Some(cursor)), state.list_generation)
        };
        let page = self.service.list(&query).await?;

        let mut state = self.state.lock();
        if state.list_generation != generation {
            debug!("Dropping feed page fetched against an old list");
            return Ok(false);
        }
        state.items.extend(page.items);
        state.next_cursor = page.next_cursor;
        state.list_generation += 1;
        Ok(true)
    }

    /// Every item matching the filters, walking all cursors
    ///
    /// Leaves the loaded list untouched.
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure of any page.
    pub async fn collect_all(&self) -> Result<Vec<NotificationItem>> {
        let filters = self.filters();
        let mut items = Vec::new();
        let mut cursor = None;
        loop {
            let NotificationPage { items: page, next_cursor } =
                self.service.list(&self.query(&filters, cursor)).await?;
            items.extend(page);
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    /// Loaded items, newest first
    pub fn items(&self) -> Vec<NotificationItem> {
        self.state.lock().items.clone()
    }

    /// Whether `load_more` can fetch another page
    pub fn has_more(&self) -> bool {
        self.state.lock().next_cursor.is_some()
    }

    /// Unread items among the loaded ones
    pub fn unread_count(&self) -> usize {
        self.state.lock().items.iter().filter(|n| !n.read).count()
    }

    /// Mark one item read, then reload
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.service.mark_read(id).await?;
        info!(id, "Notification marked read");
        self.refresh().await.map(|_| ())
    }

    /// Mark everything read, then reload
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn mark_all_read(&self) -> Result<()> {
        self.service.mark_all_read().await?;
        info!("All notifications marked read");
        self.refresh().await.map(|_| ())
    }

    /// Reload when the console regains focus, if configured to
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn on_focus(&self) -> Result<()> {
        if self.config.refresh_on_focus {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Poll interval from the configuration
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs)
    }

    /// Refresh every `period` until `shutdown` is cancelled
    ///
    /// The first refresh happens one period after spawning. Failed polls are
    /// logged and the loop keeps going.
    pub fn spawn_polling(&self, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let feed = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Notification polling started");

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match feed.refresh().await {
                            Ok(count) => debug!(count, "Notification poll"),
                            Err(e) => warn!(error = %e, "Notification poll failed"),
                        }
                    }
                }
            }
            info!("Notification polling stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use console_service::types::{Ack, NotificationDraft};
    use console_service::{MockNotificationService, ServiceError, ServiceResult};
    use pretty_assertions::assert_eq;

    fn feed() -> (NotificationFeed, MockNotificationService) {
        let service = MockNotificationService::seeded(42, Utc::now());
        let feed = NotificationFeed::new(Arc::new(service.clone()), NotificationConfig::default());
        (feed, service)
    }

    struct Unreachable;

    #[async_trait]
    impl NotificationService for Unreachable {
        async fn list(&self, _query: &NotificationQuery) -> ServiceResult<NotificationPage> {
            Err(ServiceError::unavailable("notifications"))
        }

        async fn mark_read(&self, _id: &str) -> ServiceResult<Ack> {
            Err(ServiceError::unavailable("notifications"))
        }

        async fn mark_all_read(&self) -> ServiceResult<Ack> {
            Err(ServiceError::unavailable("notifications"))
        }

        async fn push(&self, _draft: NotificationDraft) -> ServiceResult<NotificationItem> {
            Err(ServiceError::unavailable("notifications"))
        }
    }

    #[tokio::test]
    async fn test_cursor_paging() {
        let (feed, _service) = feed();
        assert_eq!(feed.refresh().await.unwrap(), 10);
        assert!(feed.has_more());

        assert!(feed.load_more().await.unwrap());
        assert_eq!(feed.items().len(), 18);
        assert!(!feed.has_more());
        assert!(!feed.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn test_collect_all_terminates() {
        let (feed, service) = feed();
        let all = feed.collect_all().await.unwrap();
        assert_eq!(all.len(), 18);
        assert_eq!(service.call_count("list"), 2);
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn test_unread_count_and_mark_read() {
        let (feed, _service) = feed();
        feed.refresh().await.unwrap();
        assert_eq!(feed.unread_count(), 6);

        feed.mark_read("n_0").await.unwrap();
        assert_eq!(feed.unread_count(), 5);

        feed.mark_all_read().await.unwrap();
        assert_eq!(feed.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_filters_reset_the_list() {
        let (feed, _service) = feed();
        feed.refresh().await.unwrap();

        feed.set_filters(FeedFilters {
            unread: true,
            ..FeedFilters::default()
        });
        assert!(feed.items().is_empty());

        feed.refresh().await.unwrap();
        assert_eq!(feed.items().len(), 6);
        assert!(feed.items().iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn test_focus_refresh_follows_config() {
        let service = MockNotificationService::seeded(42, Utc::now());
        let config = NotificationConfig {
            refresh_on_focus: false,
            ..NotificationConfig::default()
        };
        let feed = NotificationFeed::new(Arc::new(service.clone()), config);

        feed.on_focus().await.unwrap();
        assert_eq!(service.call_count("list"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_until_cancelled() {
        let (feed, service) = feed();
        let shutdown = CancellationToken::new();
        let handle = feed.spawn_polling(Duration::from_secs(20), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(41)).await;
        assert_eq!(service.call_count("list"), 2);

        shutdown.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.call_count("list"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_do_not_stop_the_loop() {
        let feed = NotificationFeed::new(Arc::new(Unreachable), NotificationConfig::default());
        let shutdown = CancellationToken::new();
        let handle = feed.spawn_polling(Duration::from_secs(20), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert!(!handle.is_finished());
        assert!(feed.items().is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
