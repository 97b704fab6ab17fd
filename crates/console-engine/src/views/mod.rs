//! Management views
//!
//! Each view owns the query state of its table and reads through the shared
//! [`CacheHub`]. Views never hold each other; the dashboard shell creates them
//! from a [`ViewContext`] and pushes shared search and date values in.

pub mod analytics;
pub mod notifications;
pub mod payments;
pub mod students;
pub mod teachers;
pub mod users;

pub use analytics::AnalyticsView;
pub use notifications::NotificationFeed;
pub use payments::PaymentsView;
pub use students::{ActivityFilter, StudentProgressView};
pub use teachers::TeacherManagement;
pub use users::{UserManagement, UserRow, UserStats};

use crate::cache::{CacheHub, DataCache};
use crate::error::Result;
use crate::export::PdfLayout;
use crate::query::{CacheKey, FilterValue, PageSize, QueryParams, QueryStore, total_pages};
use crate::table::{PageAction, PaginationControls, SortingState};
use crate::toast::NotificationBus;
use console_core::{Config, Entity};
use console_service::{
    AdminService, ListResponse, MockBackend, MutationAck, NotificationService, ServiceError,
    ServiceResult,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Collaborators and shared state handed to every view
#[derive(Clone)]
pub struct ViewContext {
    /// Admin data service
    pub admin: Arc<dyn AdminService>,
    /// Notification feed service
    pub notifications: Arc<dyn NotificationService>,
    /// Process-wide caches
    pub caches: CacheHub,
    /// Toast bus
    pub bus: NotificationBus,
    /// Loaded configuration
    pub config: Arc<Config>,
}

impl std::fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewContext")
            .field("caches", &self.caches)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl ViewContext {
    /// Context over explicit collaborators
    pub fn new(
        admin: Arc<dyn AdminService>,
        notifications: Arc<dyn NotificationService>,
        bus: NotificationBus,
        config: Config,
    ) -> Self {
        Self {
            admin,
            notifications,
            caches: CacheHub::new(),
            bus,
            config: Arc::new(config),
        }
    }

    /// Context over the seeded mock backend
    pub fn from_backend(backend: &MockBackend, config: Config) -> Self {
        let bus = NotificationBus::new(Duration::from_millis(config.console.toast_duration_ms));
        Self::new(
            Arc::new(backend.admin.clone()),
            Arc::new(backend.notifications.clone()),
            bus,
            config,
        )
    }

    /// Page size a view opens with
    pub fn page_size(&self) -> PageSize {
        PageSize::try_from(self.config.console.default_page_size).unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to the smallest page size");
            PageSize::default()
        })
    }

    /// PDF geometry from the export configuration
    pub fn pdf_layout(&self) -> PdfLayout {
        PdfLayout::from(&self.config.export)
    }

    /// Directory exports are written to
    pub fn export_dir(&self) -> PathBuf {
        self.config.export.output_dir.clone()
    }
}

/// Query state and current page of one server-paginated table
#[derive(Debug)]
pub struct TableState<E: Entity> {
    scope: &'static str,
    query: QueryStore,
    sorting: SortingState,
    response: Option<Arc<ListResponse<E>>>,
}

impl<E: Entity> TableState<E> {
    /// Empty table in cache scope `scope`
    pub fn new(scope: &'static str, page_size: PageSize) -> Self {
        Self {
            scope,
            query: QueryStore::new(page_size),
            sorting: SortingState::default(),
            response: None,
        }
    }

    /// Current query state
    pub const fn query(&self) -> &QueryParams {
        self.query.get()
    }

    /// Client sort state
    pub const fn sorting(&self) -> &SortingState {
        &self.sorting
    }

    /// Cache key of the current query
    pub fn cache_key(&self) -> CacheKey {
        self.query.cache_key(self.scope)
    }

    /// Move to `page`
    ///
    /// # Errors
    ///
    /// Returns a validation error for page 0.
    pub fn set_page(&mut self, page: u32) -> Result<()> {
        self.query.set_page(page).map(|_| ())
    }

    /// Follow a pagination button; `false` when it is disabled
    ///
    /// # Errors
    ///
    /// Never fails for an enabled button.
    pub fn go(&mut self, action: PageAction) -> Result<bool> {
        match self.pagination().target(action) {
            Some(page) => self.set_page(page).map(|()| true),
            None => Ok(false),
        }
    }

    /// Change the page size; returns to page 1
    pub fn set_page_size(&mut self, size: PageSize) {
        self.query.set_page_size(size);
    }

    /// Change the local search; returns to page 1
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.query.set_search(search);
    }

    /// Set a named filter; returns to page 1
    pub fn set_filter(&mut self, name: &str, value: impl Into<FilterValue>) {
        self.query.set_filter(name, value);
    }

    /// Remove a named filter; returns to page 1
    pub fn clear_filter(&mut self, name: &str) {
        self.query.clear_filter(name);
    }

    /// Cycle the sort of `column` and request the same order remotely
    pub fn toggle_sort(&mut self, column: &str) {
        self.sorting.toggle(column);
        self.query.set_sort(self.sorting.to_specs());
    }

    /// Fetch the current page through `cache`
    ///
    /// When the result shows the page is past the end, the page is clamped
    /// and fetched once more.
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load<F, Fut>(&mut self, cache: &DataCache<E>, fetch: F) -> Result<Arc<ListResponse<E>>>
    where
        F: Fn(QueryParams) -> Fut,
        Fut: Future<Output = ServiceResult<ListResponse<E>>> + Send + 'static,
    {
        let params = self.query.get().clone();
        let mut response = cache.fetch_list(self.cache_key(), || fetch(params)).await?;
        if self.query.clamp_page(response.total) {
            debug!(scope = self.scope, page = self.query.get().page, "Clamped page after fetch");
            let params = self.query.get().clone();
            response = cache.fetch_list(self.cache_key(), || fetch(params)).await?;
        }
        self.response = Some(Arc::clone(&response));
        Ok(response)
    }

    /// Pick up the cached copy of the current page, e.g. after a write
    pub fn sync(&mut self, cache: &DataCache<E>) {
        if let Some(response) = cache.peek(&self.cache_key()) {
            self.response = Some(response);
        }
    }

    /// Last loaded page
    pub fn response(&self) -> Option<&ListResponse<E>> {
        self.response.as_deref()
    }

    /// Items on the last loaded page
    pub fn items(&self) -> &[E] {
        self.response.as_deref().map_or(&[], |r| r.items.as_slice())
    }

    /// Matches before pagination
    pub fn total(&self) -> u64 {
        self.response.as_deref().map_or(0, |r| r.total)
    }

    /// Footer state
    pub fn pagination(&self) -> PaginationControls {
        let params = self.query.get();
        PaginationControls::new(params.page, params.page_size.get(), self.total())
    }
}

/// Walk every page of `base` at the largest page size
///
/// Pages come back in server order with their side tables intact.
pub(crate) async fn collect_pages<E, F, Fut>(
    cache: &DataCache<E>,
    scope: &str,
    base: &QueryParams,
    fetch: F,
) -> Result<Vec<Arc<ListResponse<E>>>>
where
    E: Entity,
    F: Fn(QueryParams) -> Fut,
    Fut: Future<Output = ServiceResult<ListResponse<E>>> + Send + 'static,
{
    let mut params = base.clone();
    params.page = 1;
    params.page_size = PageSize::Fifty;

    let mut pages = Vec::new();
    loop {
        let request = params.clone();
        let page = cache
            .fetch_list(CacheKey::new(scope, &params), || fetch(request))
            .await?;
        let done = page.items.is_empty()
            || params.page >= total_pages(page.total, params.page_size.get());
        pages.push(page);
        if done {
            break;
        }
        params.page += 1;
    }
    debug!(scope, pages = pages.len(), "Collected full result set");
    Ok(pages)
}

/// Treat a negative acknowledgement as a failed write
pub(crate) fn require_ack(ack: MutationAck) -> ServiceResult<MutationAck> {
    if ack.success {
        Ok(ack)
    } else {
        Err(ServiceError::remote_failure("write was not applied"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{DateTime, Utc};
    use console_service::MockAdminService;

    pub(crate) fn context(now: DateTime<Utc>) -> (ViewContext, MockBackend) {
        let config = Config::default();
        let backend = MockBackend::from_config(&console_core::config::ServiceConfig {
            latency_ms: 0,
            seed: 42,
        }, now);
        (ViewContext::from_backend(&backend, config), backend)
    }

    pub(crate) fn admin(backend: &MockBackend) -> &MockAdminService {
        &backend.admin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use console_core::User;
    use console_service::UserListParams;
    use pretty_assertions::assert_eq;

    fn fetcher(
        admin: Arc<dyn AdminService>,
    ) -> impl Fn(QueryParams) -> std::pin::Pin<Box<dyn Future<Output = ServiceResult<ListResponse<User>>> + Send>>
    {
        move |params| {
            let admin = Arc::clone(&admin);
            Box::pin(async move {
                let mut request = UserListParams::new(params.page, params.page_size.get());
                request.search = params.search_term();
                admin.list_users(&request).await
            })
        }
    }

    #[tokio::test]
    async fn test_load_clamps_past_the_end() {
        let (ctx, backend) = test_support::context(Utc::now());
        let mut table: TableState<User> = TableState::new("users", PageSize::Ten);
        table.set_page(40).unwrap();

        let response = table
            .load(&ctx.caches.users, fetcher(Arc::clone(&ctx.admin)))
            .await
            .unwrap();
        assert_eq!(table.query().page, 9);
        assert_eq!(response.items.len(), 10);
        assert_eq!(test_support::admin(&backend).call_count("list_users"), 2);
    }

    #[tokio::test]
    async fn test_pagination_buttons_move_the_page() {
        let (ctx, _backend) = test_support::context(Utc::now());
        let mut table: TableState<User> = TableState::new("users", PageSize::Twenty);
        table
            .load(&ctx.caches.users, fetcher(Arc::clone(&ctx.admin)))
            .await
            .unwrap();

        assert!(!table.go(PageAction::Prev).unwrap());
        assert!(table.go(PageAction::Last).unwrap());
        assert_eq!(table.query().page, 5);

        table.set_search("zz-no-match");
        assert_eq!(table.query().page, 1);
        table
            .load(&ctx.caches.users, fetcher(Arc::clone(&ctx.admin)))
            .await
            .unwrap();
        assert!(table.items().is_empty());
        assert_eq!(table.pagination().total_pages, 1);
    }

    #[test]
    fn test_query_setters_apply_and_return_to_page_one() {
        let mut table: TableState<User> = TableState::new("users", PageSize::Ten);

        table.set_page(3).unwrap();
        table.set_filter("status", "suspended");
        assert_eq!(table.query().page, 1);
        assert_eq!(table.query().filter("status"), Some(&FilterValue::from("suspended")));

        table.set_page(3).unwrap();
        table.toggle_sort("name");
        assert_eq!(table.query().page, 1);
        assert_eq!(table.query().sort, table.sorting().to_specs());
        assert!(!table.query().sort.is_empty());

        table.set_page(3).unwrap();
        table.set_page_size(PageSize::Fifty);
        assert_eq!(table.query().page, 1);
        assert_eq!(table.query().page_size, PageSize::Fifty);

        table.set_page(2).unwrap();
        table.clear_filter("status");
        assert_eq!(table.query().page, 1);
        assert!(table.query().filter("status").is_none());

        assert!(table.set_page(0).is_err());
        assert_eq!(table.query().page, 1);
    }

    #[tokio::test]
    async fn test_collect_pages_walks_every_page() {
        let (ctx, backend) = test_support::context(Utc::now());
        let base = QueryParams::default();

        let pages = collect_pages(&ctx.caches.users, "users", &base, fetcher(Arc::clone(&ctx.admin)))
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.iter().map(|p| p.items.len()).sum::<usize>(), 90);
        assert_eq!(test_support::admin(&backend).call_count("list_users"), 2);
    }

    #[test]
    fn test_negative_ack_is_a_failure() {
        assert!(require_ack(MutationAck { success: true }).is_ok());
        assert!(require_ack(MutationAck { success: false }).is_err());
    }
}
