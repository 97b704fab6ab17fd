//! Teacher management table and activity-log overlay

use super::{TableState, ViewContext, collect_pages};
use crate::error::{ConsoleError, Result};
use crate::export::{ExportArtifact, ExportFormat, ExportScope, export_rows};
use crate::overlay::{DetailResource, DetailState};
use crate::query::QueryParams;
use crate::table::{Column, RenderedTable, TableView};
use console_core::Teacher;
use console_core::utils::format_date;
use console_service::types::ActivityLogPage;
use console_service::{AdminService, ListResponse, ServiceResult, TeacherListParams};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Cache scope of the teacher table
pub const SCOPE: &str = "teachers";

fn teacher_columns() -> Vec<Column<Teacher>> {
    vec![
        Column::new("teacher_name", "Teacher Name", |t: &Teacher| t.name.clone()).display_only(),
        Column::new("name", "Name", |t: &Teacher| t.name.clone()).export_only(),
        Column::new("email", "Email", |t: &Teacher| t.email.clone()),
        Column::new("assigned", "Assigned Students", |t: &Teacher| t.assigned_students_count),
        Column::new("last_activity_at", "Last Activity", |t: &Teacher| format_date(t.last_activity_at)),
        Column::new("actions", "Actions", |_: &Teacher| "View Logs | Assign Students").display_only(),
    ]
}

fn teacher_fetcher(
    admin: Arc<dyn AdminService>,
) -> impl Fn(QueryParams) -> BoxFuture<'static, ServiceResult<ListResponse<Teacher>>> {
    move |params| {
        let admin = Arc::clone(&admin);
        let mut request = TeacherListParams::new(params.page, params.page_size.get());
        request.search = params.search_term();
        async move { admin.list_teachers(&request).await }.boxed()
    }
}

/// Teacher management view
#[derive(Debug)]
pub struct TeacherManagement {
    ctx: ViewContext,
    table: TableState<Teacher>,
    columns: Vec<Column<Teacher>>,
    selected: Option<Teacher>,
    logs: DetailResource<ActivityLogPage>,
}

impl TeacherManagement {
    /// View seeded with the shell's search text
    pub fn new(ctx: ViewContext, search: &str) -> Self {
        let mut table = TableState::new(SCOPE, ctx.page_size());
        table.set_search(search);
        Self {
            ctx,
            table,
            columns: teacher_columns(),
            selected: None,
            logs: DetailResource::new(),
        }
    }

    /// Query state and current page
    pub const fn table(&self) -> &TableState<Teacher> {
        &self.table
    }

    /// Mutable query state for paging, page size and search
    pub const fn table_mut(&mut self) -> &mut TableState<Teacher> {
        &mut self.table
    }

    /// Fetch the current page
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load(&mut self) -> Result<()> {
        let fetch = teacher_fetcher(Arc::clone(&self.ctx.admin));
        self.table.load(&self.ctx.caches.teachers, fetch).await?;
        Ok(())
    }

    /// Render the current page
    pub fn render(&self) -> RenderedTable {
        let params = self.table.query();
        TableView::new(&self.columns).render(
            self.table.items(),
            params.page,
            params.page_size.get(),
            self.table.total(),
        )
    }

    /// Open the activity log of a teacher on the current page
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::NotFound`] when the teacher is not on the
    /// page; fetch failures surface in the returned state instead.
    pub async fn open_logs(&mut self, teacher_id: &str) -> Result<DetailState<ActivityLogPage>> {
        let teacher = self
            .table
            .items()
            .iter()
            .find(|t| t.id == teacher_id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("teacher {teacher_id}")))?;
        self.selected = Some(teacher);

        let admin = Arc::clone(&self.ctx.admin);
        Ok(self
            .logs
            .open(teacher_id, |id| async move { admin.teacher_activity_logs(&id).await })
            .await)
    }

    /// Overlay state
    pub fn logs(&self) -> DetailState<ActivityLogPage> {
        self.logs.state()
    }

    /// Log lines as shown in the overlay, empty while loading
    pub fn log_lines(&self) -> Vec<String> {
        let (Some(teacher), Some(page)) = (&self.selected, self.logs.data()) else {
            return Vec::new();
        };
        page.items
            .iter()
            .map(|log| format!("{} {} at {}", teacher.name, log.text, format_date(log.at)))
            .collect()
    }

    /// Close the overlay
    pub fn close_logs(&mut self) {
        self.selected = None;
        self.logs.clear();
    }

    /// Export the rows on screen
    ///
    /// # Errors
    ///
    /// Returns an export error if rendering fails.
    pub fn export_visible_page(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let visible = TableView::new(&self.columns).visible_rows(self.table.items());
        export_rows(format, &visible, &self.columns, "teachers", "Teachers", self.ctx.pdf_layout())
    }

    /// Export every teacher matching the search
    ///
    /// # Errors
    ///
    /// Returns the remote failure of any page, or an export error.
    pub async fn export_full_filtered_set(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let fetch = teacher_fetcher(Arc::clone(&self.ctx.admin));
        let pages =
            collect_pages(&self.ctx.caches.teachers, SCOPE, self.table.query(), fetch).await?;
        let rows: Vec<&Teacher> = pages.iter().flat_map(|page| page.items.iter()).collect();
        export_rows(format, &rows, &self.columns, "teachers-all", "Teachers", self.ctx.pdf_layout())
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
