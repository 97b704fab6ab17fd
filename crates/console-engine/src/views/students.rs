//! Student progress table, summary cards and profile overlay

use super::users::user_fetcher;
use super::{TableState, ViewContext, collect_pages};
use crate::error::Result;
use crate::export::{ExportArtifact, ExportFormat, ExportScope, export_rows};
use crate::overlay::{DetailResource, DetailState};
use crate::table::{Column, RenderedTable, TableView};
use chrono::{DateTime, Utc};
use console_core::types::{StudentProfile, StudentSummary};
use console_core::utils::{format_date, start_of_day};
use console_core::{DateRange, Role, User};
use console_service::{AccountStatusFilter, ListResponse, SortSpec, UserListParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Cache scope of the student table
pub const SCOPE: &str = "students";

/// Days covered by the summary cards
const SUMMARY_DAYS: i64 = 30;

/// Client-side activity filter
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityFilter {
    /// Every student on the page
    #[default]
    All,
    /// Students who logged in since midnight
    ActiveToday,
}

impl ActivityFilter {
    fn keeps(self, user: &User, today: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::ActiveToday => user.last_login_at >= today,
        }
    }
}

/// A student with their completion percentage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    /// Account
    pub user: User,
    /// Completion percentage, 0 when unknown
    pub progress: u8,
}

fn rows_of(page: &ListResponse<User>) -> impl Iterator<Item = StudentRow> + '_ {
    page.items.iter().map(|user| StudentRow {
        progress: page
            .auxiliary
            .as_ref()
            .and_then(|aux| aux.progress_for(&user.id))
            .unwrap_or_default(),
        user: user.clone(),
    })
}

fn student_columns() -> Vec<Column<StudentRow>> {
    vec![
        Column::new("student", "Student", |r: &StudentRow| r.user.name.clone()).display_only(),
        Column::new("name", "Name", |r: &StudentRow| r.user.name.clone()).export_only(),
        Column::new("email", "Email", |r: &StudentRow| r.user.email.clone()).export_only(),
        Column::new("progress", "Progress %", |r: &StudentRow| r.progress),
        Column::new("last_login_at", "Last Login", |r: &StudentRow| format_date(r.user.last_login_at)),
        Column::new("actions", "Actions", |_: &StudentRow| "View").display_only(),
    ]
}

fn students_only(request: &mut UserListParams) {
    request.role = Some(Role::Student);
    request.status = AccountStatusFilter::All;
    request.sort = vec![SortSpec::asc("name")];
}

/// Student progress view
#[derive(Debug)]
pub struct StudentProgressView {
    ctx: ViewContext,
    table: TableState<User>,
    columns: Vec<Column<StudentRow>>,
    activity: ActivityFilter,
    summary: Option<StudentSummary>,
    profile: DetailResource<StudentProfile>,
}

impl StudentProgressView {
    /// View seeded with the shell's search text
    pub fn new(ctx: ViewContext, search: &str) -> Self {
        let mut table = TableState::new(SCOPE, ctx.page_size());
        table.set_search(search);
        Self {
            ctx,
            table,
            columns: student_columns(),
            activity: ActivityFilter::All,
            summary: None,
            profile: DetailResource::new(),
        }
    }

    /// Query state and current page
    pub const fn table(&self) -> &TableState<User> {
        &self.table
    }

    /// Mutable query state for paging, page size and search
    pub const fn table_mut(&mut self) -> &mut TableState<User> {
        &mut self.table
    }

    /// Current activity filter
    pub const fn activity(&self) -> ActivityFilter {
        self.activity
    }

    /// Change the activity filter; applies to the loaded page only
    pub const fn set_activity(&mut self, activity: ActivityFilter) {
        self.activity = activity;
    }

    /// Fetch the current page of students, ordered by name
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load(&mut self) -> Result<()> {
        let fetch = user_fetcher(Arc::clone(&self.ctx.admin), students_only);
        self.table.load(&self.ctx.caches.users, fetch).await?;
        Ok(())
    }

    /// Fetch the summary cards for the last 30 days
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load_summary(&mut self) -> Result<StudentSummary> {
        let range = DateRange::last_days(Utc::now(), SUMMARY_DAYS);
        let summary = self.ctx.admin.student_summary(&range).await?;
        debug!(?summary, "Student summary loaded");
        self.summary = Some(summary);
        Ok(summary)
    }

    /// Summary cards; before the summary loads the total falls back to the
    /// rows on screen
    pub fn summary(&self) -> StudentSummary {
        self.summary.unwrap_or_else(|| StudentSummary {
            total_students: self.rows().len() as u64,
            average_completion: 0,
            active_today: 0,
        })
    }

    /// Rows on screen as of now
    pub fn rows(&self) -> Vec<StudentRow> {
        self.rows_at(Utc::now())
    }

    /// Rows on screen with "today" starting at the day of `now`
    pub fn rows_at(&self, now: DateTime<Utc>) -> Vec<StudentRow> {
        let today = start_of_day(now);
        self.table
            .response()
            .map(|page| {
                rows_of(page)
                    .filter(|row| self.activity.keeps(&row.user, today))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render the current page
    pub fn render(&self) -> RenderedTable {
        let params = self.table.query();
        TableView::new(&self.columns).render(
            &self.rows(),
            params.page,
            params.page_size.get(),
            self.table.total(),
        )
    }

    /// Open the profile overlay and fetch the student's record
    pub async fn open_profile(&self, user_id: &str) -> DetailState<StudentProfile> {
        let admin = Arc::clone(&self.ctx.admin);
        self.profile
            .open(user_id, |id| async move { admin.student_profile(&id).await })
            .await
    }

    /// Overlay state
    pub fn profile(&self) -> DetailState<StudentProfile> {
        self.profile.state()
    }

    /// Close the overlay
    pub fn close_profile(&self) {
        self.profile.clear();
    }

    /// Export the rows on screen
    ///
    /// # Errors
    ///
    /// Returns an export error if rendering fails.
    pub fn export_visible_page(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let rows = self.rows();
        let visible: Vec<&StudentRow> = rows.iter().collect();
        export_rows(format, &visible, &self.columns, "students", "Students", self.ctx.pdf_layout())
    }

    /// Export every matching student, activity filter included
    ///
    /// # Errors
    ///
    /// Returns the remote failure of any page, or an export error.
    pub async fn export_full_filtered_set(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let fetch = user_fetcher(Arc::clone(&self.ctx.admin), students_only);
        let pages = collect_pages(&self.ctx.caches.users, SCOPE, self.table.query(), fetch).await?;
        let today = start_of_day(Utc::now());
        let rows: Vec<StudentRow> = pages
            .iter()
            .flat_map(|page| rows_of(page))
            .filter(|row| self.activity.keeps(&row.user, today))
            .collect();
        let visible: Vec<&StudentRow> = rows.iter().collect();
        export_rows(format, &visible, &self.columns, "students-all", "Students", self.ctx.pdf_layout())
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
    use crate::views::test_support;
    use console_service::MockBackend;
    use pretty_assertions::assert_eq;

    async fn loaded() -> (StudentProgressView, MockBackend) {
        let (ctx, backend) = test_support::context(Utc::now());
        let mut view = StudentProgressView::new(ctx, "");
        view.load().await.unwrap();
        (view, backend)
    }

    fn student_count(backend: &MockBackend) -> usize {
        backend
            .admin
            .snapshot()
            .users
            .iter()
            .filter(|u| u.role == Role::Student)
            .count()
    }

    #[tokio::test]
    async fn test_lists_students_by_name() {
        let (view, backend) = loaded().await;
        let rows = view.rows();

        assert_eq!(view.table().total(), student_count(&backend) as u64);
        assert!(rows.iter().all(|r| r.user.role == Role::Student));
        let names: Vec<String> = rows.iter().map(|r| r.user.name.to_lowercase()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_activity_filter_is_client_side() {
        let (mut view, backend) = loaded().await;
        let now = Utc::now();
        let everyone = view.rows_at(now).len();

        view.set_activity(ActivityFilter::ActiveToday);
        let active = view.rows_at(now);
        assert!(active.len() <= everyone);
        assert!(active.iter().all(|r| r.user.last_login_at >= start_of_day(now)));
        assert_eq!(view.table().query().page, 1);
        assert_eq!(backend.admin.call_count("list_users"), 1);
    }

    #[tokio::test]
    async fn test_summary_cards() {
        let (mut view, backend) = loaded().await;
        assert_eq!(view.summary().total_students, view.rows().len() as u64);

        let summary = view.load_summary().await.unwrap();
        assert_eq!(summary.total_students, student_count(&backend) as u64);
        assert!(summary.average_completion <= 100);
        assert_eq!(view.summary(), summary);
    }

    #[tokio::test]
    async fn test_profile_overlay() {
        let (view, _backend) = loaded().await;
        let id = view.rows()[0].user.id.clone();

        let state = view.open_profile(&id).await;
        let DetailState::Loaded { data, .. } = state else {
            panic!("expected a loaded profile");
        };
        assert_eq!(data.user.id, id);

        let missing = view.open_profile("u_999").await;
        assert!(matches!(
            missing,
            DetailState::Failed { error: ConsoleError::NotFound { .. }, .. }
        ));
        assert_eq!(view.rows().len(), 10);

        view.close_profile();
        assert_eq!(view.profile(), DetailState::Idle);
    }

    #[tokio::test]
    async fn test_export_columns() {
        let (view, _backend) = loaded().await;
        let headers: Vec<&str> = view.render().headers.iter().map(|h| h.label).collect();
        assert_eq!(headers, vec!["Student", "Progress %", "Last Login", "Actions"]);

        let artifact = view.export_visible_page(ExportFormat::Csv).unwrap();
        assert_eq!(artifact.filename, "students.csv");
        let csv = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(csv.lines().next(), Some("Name,Email,Progress %,Last Login"));
        assert_eq!(csv.lines().count(), 11);
    }

    #[tokio::test]
    async fn test_full_export_counts_every_student() {
        let (view, backend) = loaded().await;
        let artifact = view
            .export(ExportFormat::Csv, ExportScope::FullFilteredSet)
            .await
            .unwrap();
        let csv = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(csv.lines().count(), student_count(&backend) + 1);
    }
}
