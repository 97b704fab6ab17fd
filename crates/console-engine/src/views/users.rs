//! User management table

use super::{TableState, ViewContext, collect_pages, require_ack};
use crate::error::Result;
use crate::export::{ExportArtifact, ExportFormat, ExportScope, export_rows};
use crate::query::{FilterValue, QueryParams};
use crate::table::{CellValue, Column, RenderedTable, TableView};
use crate::toast::Toast;
use chrono::{DateTime, Utc};
use console_core::utils::{format_date, initials, start_of_day};
use console_core::{EntityId, Role, User};
use console_service::{
    AccountStatusFilter, AdminService, ListResponse, ServiceResult, UserListParams,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Cache scope of the user table
pub const SCOPE: &str = "users";

const ROLE_FILTER: &str = "role";
const STATUS_FILTER: &str = "status";

/// A user together with the progress value from the page's side table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    /// Account
    pub user: User,
    /// Completion percentage, `None` for non-students
    pub progress: Option<u8>,
}

impl UserRow {
    fn is_student(&self) -> bool {
        self.user.role == Role::Student
    }

    /// Avatar fallback shown when the account has no picture
    pub fn avatar_initials(&self) -> String {
        initials(&self.user.name)
    }

    /// Rows of one page, progress looked up per user
    pub fn from_page(page: &ListResponse<User>) -> Vec<Self> {
        page.items
            .iter()
            .map(|user| Self {
                progress: page
                    .auxiliary
                    .as_ref()
                    .and_then(|aux| aux.progress_for(&user.id)),
                user: user.clone(),
            })
            .collect()
    }
}

/// Label of an account status
pub const fn status_label(is_active: bool) -> &'static str {
    if is_active { "Active" } else { "Suspended" }
}

fn user_columns() -> Vec<Column<UserRow>> {
    vec![
        Column::new("name", "Name", |r: &UserRow| r.user.name.clone()).sortable(),
        Column::new("email", "Email", |r: &UserRow| r.user.email.clone()).export_only(),
        Column::new("role", "Role", |r: &UserRow| r.user.role.as_str()).sortable(),
        Column::new("progress", "Progress %", |r: &UserRow| {
            if r.is_student() {
                CellValue::from(r.progress.unwrap_or_default())
            } else {
                CellValue::from("—")
            }
        }),
        Column::new("last_login_at", "Last Login", |r: &UserRow| format_date(r.user.last_login_at))
            .sort_by(|a: &UserRow, b: &UserRow| a.user.last_login_at.cmp(&b.user.last_login_at)),
        Column::new("status", "Status", |r: &UserRow| status_label(r.user.is_active)),
        Column::new("actions", "Actions", |r: &UserRow| {
            if r.user.is_active { "View | Suspend" } else { "View | Activate" }
        })
        .display_only(),
    ]
}

fn status_key(status: AccountStatusFilter) -> &'static str {
    match status {
        AccountStatusFilter::All => "all",
        AccountStatusFilter::Active => "active",
        AccountStatusFilter::Suspended => "suspended",
    }
}

/// Translate the table's query state into a `list_users` request
pub fn user_list_params(params: &QueryParams) -> UserListParams {
    let mut request = UserListParams::new(params.page, params.page_size.get());
    request.search = params.search_term();
    request.role = params
        .filter(ROLE_FILTER)
        .and_then(FilterValue::as_text)
        .and_then(|role| role.parse().ok());
    request.status = match params.filter(STATUS_FILTER).and_then(FilterValue::as_text) {
        Some("active") => AccountStatusFilter::Active,
        Some("suspended") => AccountStatusFilter::Suspended,
        _ => AccountStatusFilter::All,
    };
    request.sort = params.sort.clone();
    request
}

/// Fetcher for user pages, `adjust` runs on every request before it is sent
pub(crate) fn user_fetcher(
    admin: Arc<dyn AdminService>,
    adjust: fn(&mut UserListParams),
) -> impl Fn(QueryParams) -> BoxFuture<'static, ServiceResult<ListResponse<User>>> {
    move |params| {
        let admin = Arc::clone(&admin);
        let mut request = user_list_params(&params);
        adjust(&mut request);
        async move { admin.list_users(&request).await }.boxed()
    }
}

/// Stat cards above the user table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Matches across every page
    pub total_users: u64,
    /// Students on the current page
    pub total_students: usize,
    /// Non-students on the current page
    pub teachers_admins: usize,
    /// Users on the current page who logged in today
    pub active_today: usize,
}

/// User management view
#[derive(Debug)]
pub struct UserManagement {
    ctx: ViewContext,
    table: TableState<User>,
    columns: Vec<Column<UserRow>>,
    selected: Option<EntityId>,
}

impl UserManagement {
    /// View seeded with the shell's search text
    pub fn new(ctx: ViewContext, search: &str) -> Self {
        let mut table = TableState::new(SCOPE, ctx.page_size());
        table.set_search(search);
        Self {
            ctx,
            table,
            columns: user_columns(),
            selected: None,
        }
    }

    /// Query state and current page
    pub const fn table(&self) -> &TableState<User> {
        &self.table
    }

    /// Mutable query state for paging, page size, search and sorting
    pub const fn table_mut(&mut self) -> &mut TableState<User> {
        &mut self.table
    }

    /// Restrict to one role, `None` for all roles
    pub fn set_role_filter(&mut self, role: Option<Role>) {
        match role {
            Some(role) => self.table.set_filter(ROLE_FILTER, role.as_str()),
            None => self.table.clear_filter(ROLE_FILTER),
        }
    }

    /// Restrict by account status
    pub fn set_status_filter(&mut self, status: AccountStatusFilter) {
        match status {
            AccountStatusFilter::All => self.table.clear_filter(STATUS_FILTER),
            other => self.table.set_filter(STATUS_FILTER, status_key(other)),
        }
    }

    /// Fetch the current page
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load(&mut self) -> Result<()> {
        let fetch = user_fetcher(Arc::clone(&self.ctx.admin), |_| {});
        self.table.load(&self.ctx.caches.users, fetch).await?;
        Ok(())
    }

    /// Rows of the current page, in server order
    pub fn rows(&self) -> Vec<UserRow> {
        self.table.response().map(UserRow::from_page).unwrap_or_default()
    }

    /// Render the current page
    pub fn render(&self) -> RenderedTable {
        let params = self.table.query();
        TableView::new(&self.columns)
            .with_sorting(self.table.sorting())
            .render(&self.rows(), params.page, params.page_size.get(), self.table.total())
    }

    /// Stat cards as of now
    pub fn stats(&self) -> UserStats {
        self.stats_at(Utc::now())
    }

    /// Stat cards with "today" starting at the day of `now`
    pub fn stats_at(&self, now: DateTime<Utc>) -> UserStats {
        let today = start_of_day(now);
        let items = self.table.items();
        let students = items.iter().filter(|u| u.role == Role::Student).count();
        UserStats {
            total_users: self.table.total(),
            total_students: students,
            teachers_admins: items.len() - students,
            active_today: items.iter().filter(|u| u.last_login_at >= today).count(),
        }
    }

    /// Open the profile of a user on the current page
    pub fn select_user(&mut self, user_id: &str) -> Option<UserRow> {
        let row = self.rows().into_iter().find(|r| r.user.id == user_id)?;
        self.selected = Some(row.user.id.clone());
        Some(row)
    }

    /// Profile on display, reflecting any pending write
    pub fn selected(&self) -> Option<UserRow> {
        let id = self.selected.as_deref()?;
        self.rows().into_iter().find(|r| r.user.id == id)
    }

    /// Close the profile
    pub fn close_profile(&mut self) {
        self.selected = None;
    }

    /// Activate or suspend an account through the optimistic write path
    ///
    /// Every cached page showing the user flips immediately. A rejected
    /// write restores them and raises an `Action failed` toast.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConsoleError::Mutation`] when the write fails.
    pub async fn set_active(&mut self, user_id: &str, is_active: bool) -> Result<()> {
        let admin = Arc::clone(&self.ctx.admin);
        let id = user_id.to_string();
        let result = self
            .ctx
            .caches
            .users
            .mutate(
                user_id,
                move |user: &mut User| user.is_active = is_active,
                || async move { admin.set_user_active(&id, is_active).await.and_then(require_ack) },
            )
            .await;
        self.table.sync(&self.ctx.caches.users);

        match result {
            Ok(_) => {
                let title = if is_active { "User activated" } else { "User suspended" };
                self.ctx.bus.publish(Toast::new(title));
                Ok(())
            }
            Err(err) => {
                self.ctx
                    .bus
                    .publish(Toast::new("Action failed").with_description(err.to_string()));
                Err(err)
            }
        }
    }

    /// Export the rows on screen, in on-screen order
    ///
    /// # Errors
    ///
    /// Returns an export error if rendering fails.
    pub fn export_visible_page(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let rows = self.rows();
        let visible = TableView::new(&self.columns)
            .with_sorting(self.table.sorting())
            .visible_rows(&rows);
        export_rows(format, &visible, &self.columns, "users", "Users", self.ctx.pdf_layout())
    }

    /// Export every page of the current filter, search and sort
    ///
    /// # Errors
    ///
    /// Returns the remote failure of any page, or an export error.
    pub async fn export_full_filtered_set(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let fetch = user_fetcher(Arc::clone(&self.ctx.admin), |_| {});
        let pages = collect_pages(&self.ctx.caches.users, SCOPE, self.table.query(), fetch).await?;
        let rows: Vec<UserRow> = pages.iter().flat_map(|p| UserRow::from_page(p)).collect();
        info!(rows = rows.len(), "Exporting all matching users");

        let visible = TableView::new(&self.columns)
            .with_sorting(self.table.sorting())
            .visible_rows(&rows);
        export_rows(format, &visible, &self.columns, "users-all", "Users", self.ctx.pdf_layout())
    }

    /// Export in the requested scope
    ///
    /// # Errors
    ///
    /// See [`Self::export_visible_page`] and [`Self::export_full_filtered_set`].
    pub async fn export(&self, format: ExportFormat, scope: ExportScope) -> Result<ExportArtifact> {
        match scope {
            ExportScope::VisiblePage => self.export_visible_page(format),
            ExportScope::FullFilteredSet => self.export_full_filtered_set(format).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use crate::table::TableBody;
    use crate::views::test_support;
    use pretty_assertions::assert_eq;

    async fn loaded() -> (UserManagement, console_service::MockBackend) {
        let (ctx, backend) = test_support::context(Utc::now());
        let mut view = UserManagement::new(ctx, "");
        view.load().await.unwrap();
        (view, backend)
    }

    fn toast_titles(view: &UserManagement) -> Vec<String> {
        view.ctx.bus.active().into_iter().map(|t| t.toast.title).collect()
    }

    #[tokio::test]
    async fn test_render_headers_and_progress_placeholder() {
        let (mut view, _backend) = loaded().await;
        view.table_mut().set_page(2).unwrap();
        view.load().await.unwrap();

        let rendered = view.render();
        let headers: Vec<&str> = rendered.headers.iter().map(|h| h.label).collect();
        assert_eq!(
            headers,
            vec!["Name", "Role", "Progress %", "Last Login", "Status", "Actions"]
        );

        let TableBody::Rows(rows) = &rendered.body else {
            panic!("expected rows");
        };
        let teacher = view.rows().iter().position(|r| r.user.id == "u_15").unwrap();
        assert_eq!(rows[teacher][1], "teacher");
        assert_eq!(rows[teacher][2], "—");
    }

    #[tokio::test]
    async fn test_role_filter_resets_page() {
        let (mut view, _backend) = loaded().await;
        view.table_mut().set_page(3).unwrap();
        view.set_role_filter(Some(Role::Teacher));
        assert_eq!(view.table().query().page, 1);

        view.load().await.unwrap();
        assert_eq!(view.table().total(), 6);
        assert!(view.rows().iter().all(|r| r.user.role == Role::Teacher));

        view.set_role_filter(None);
        view.set_status_filter(AccountStatusFilter::Suspended);
        view.load().await.unwrap();
        assert!(view.rows().iter().all(|r| !r.user.is_active));
    }

    #[tokio::test]
    async fn test_stats_count_the_current_page() {
        let (view, _backend) = loaded().await;
        let stats = view.stats();

        assert_eq!(stats.total_users, 90);
        assert_eq!(stats.total_students + stats.teachers_admins, 10);
        assert!(stats.active_today <= 10);
    }

    #[tokio::test]
    async fn test_suspend_confirms_and_refetches() {
        let (mut view, backend) = loaded().await;
        let target = view.rows()[0].user.clone();

        view.set_active(&target.id, !target.is_active).await.unwrap();
        assert_eq!(view.rows()[0].user.is_active, !target.is_active);
        assert_eq!(
            toast_titles(&view),
            vec![if target.is_active { "User suspended" } else { "User activated" }.to_string()]
        );

        assert_eq!(view.ctx.caches.users.is_stale(&view.table().cache_key()), Some(true));
        view.load().await.unwrap();
        assert_eq!(backend.admin.call_count("list_users"), 2);
        assert_eq!(view.rows()[0].user.is_active, !target.is_active);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_with_toast() {
        let (mut view, backend) = loaded().await;
        backend.admin.set_mutation_failure(Some("write rejected".into()));
        let before = view.rows();
        let target = before[0].user.clone();

        let err = view.set_active(&target.id, !target.is_active).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Mutation { .. }));
        assert_eq!(view.rows(), before);
        assert_eq!(toast_titles(&view), vec!["Action failed".to_string()]);
    }

    #[tokio::test]
    async fn test_profile_selection_tracks_pending_write() {
        let (mut view, _backend) = loaded().await;
        let target = view.rows()[1].user.clone();

        assert!(view.select_user("u_999").is_none());
        let row = view.select_user(&target.id).unwrap();
        assert_eq!(row.user, target);
        assert_eq!(row.avatar_initials().chars().count(), 2);

        view.set_active(&target.id, !target.is_active).await.unwrap();
        assert_eq!(view.selected().unwrap().user.is_active, !target.is_active);
        view.close_profile();
        assert!(view.selected().is_none());
    }

    #[tokio::test]
    async fn test_visible_export_matches_screen() {
        let (mut view, _backend) = loaded().await;
        view.table_mut().toggle_sort("name");
        view.load().await.unwrap();

        let artifact = view.export_visible_page(ExportFormat::Csv).unwrap();
        assert_eq!(artifact.filename, "users.csv");

        let mut reader = csv::Reader::from_reader(artifact.bytes.as_slice());
        let exported_headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(
            exported_headers,
            vec!["Name", "Email", "Role", "Progress %", "Last Login", "Status"]
        );
        let exported: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(exported.len(), 10);

        let rendered = view.render();
        let TableBody::Rows(screen) = rendered.body else {
            panic!("expected rows");
        };
        let shared: Vec<(usize, usize)> = rendered
            .headers
            .iter()
            .enumerate()
            .filter_map(|(shown, header)| {
                exported_headers
                    .iter()
                    .position(|h| h == header.label)
                    .map(|written| (shown, written))
            })
            .collect();
        assert_eq!(shared.len(), 5);

        let on_screen: Vec<Vec<&str>> = screen
            .iter()
            .map(|row| shared.iter().map(|&(shown, _)| row[shown].as_str()).collect())
            .collect();
        let in_file: Vec<Vec<&str>> = exported
            .iter()
            .map(|row| shared.iter().map(|&(_, written)| row[written].as_str()).collect())
            .collect();
        assert_eq!(in_file, on_screen);

        let rows = view.rows();
        for record in &exported {
            let owner = rows.iter().find(|r| r.user.email == record[1]).unwrap();
            assert_eq!(owner.user.name, record[0]);
        }
    }

    #[tokio::test]
    async fn test_full_export_walks_all_pages() {
        let (view, _backend) = loaded().await;
        let artifact = view
            .export(ExportFormat::Csv, ExportScope::FullFilteredSet)
            .await
            .unwrap();

        assert_eq!(artifact.filename, "users-all.csv");
        let csv = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(csv.lines().count(), 91);
    }

    #[test]
    fn test_query_translation() {
        let mut store = crate::query::QueryStore::new(crate::query::PageSize::Twenty);
        store.set_search("  asha ");
        store.set_filter(ROLE_FILTER, "super_admin");
        store.set_filter(STATUS_FILTER, "active");

        let request = user_list_params(store.get());
        assert_eq!(request.window.page_size, 20);
        assert_eq!(request.role, Some(Role::SuperAdmin));
        assert_eq!(request.status, AccountStatusFilter::Active);
        assert_eq!(request.search.as_deref(), Some("asha"));
    }
}
