//! Generic table rendering
//!
//! A view describes its table once as a list of [`Column`]s. The same
//! descriptors drive on-screen rendering and file export, so the two can only
//! diverge where a column is explicitly scoped to one side.

use crate::query::total_pages;
use console_service::{SortDirection, SortSpec};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Text shown in place of an empty table body
pub const EMPTY_BODY: &str = "No data";

/// Value produced by a column accessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Free text
    Text(String),
    /// Whole number, compared numerically
    Integer(i64),
    /// Nothing to show
    Empty,
}

impl CellValue {
    /// Default ordering used by sortable columns without a comparator
    ///
    /// Numbers compare numerically, text case-insensitively, and empty
    /// cells sort first.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Empty, Self::Empty) => Ordering::Equal,
            (Self::Empty, _) => Ordering::Less,
            (_, Self::Empty) => Ordering::Greater,
            (a, b) => a
                .to_string()
                .to_lowercase()
                .cmp(&b.to_string().to_lowercase()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Empty => Ok(()),
        }
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<u64> for CellValue {
    fn from(number: u64) -> Self {
        Self::Integer(i64::try_from(number).unwrap_or(i64::MAX))
    }
}

impl From<u32> for CellValue {
    fn from(number: u32) -> Self {
        Self::Integer(i64::from(number))
    }
}

impl From<u8> for CellValue {
    fn from(number: u8) -> Self {
        Self::Integer(i64::from(number))
    }
}

impl<V: Into<Self>> From<Option<V>> for CellValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Where a column appears
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnScope {
    /// On screen and in exports
    #[default]
    Shared,
    /// On screen only, e.g. an actions column
    DisplayOnly,
    /// In exports only
    ExportOnly,
}

type Accessor<T> = Arc<dyn Fn(&T) -> CellValue + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Column descriptor shared by rendering and export
pub struct Column<T> {
    id: &'static str,
    header: &'static str,
    accessor: Accessor<T>,
    sortable: bool,
    comparator: Option<Comparator<T>>,
    scope: ColumnScope,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            header: self.header,
            accessor: Arc::clone(&self.accessor),
            sortable: self.sortable,
            comparator: self.comparator.clone(),
            scope: self.scope,
        }
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("sortable", &self.sortable)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<T> Column<T> {
    /// Shared, unsortable column
    pub fn new<F, V>(id: &'static str, header: &'static str, accessor: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<CellValue>,
    {
        Self {
            id,
            header,
            accessor: Arc::new(move |row| accessor(row).into()),
            sortable: false,
            comparator: None,
            scope: ColumnScope::Shared,
        }
    }

    /// Allow sorting by the rendered value
    #[must_use]
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Allow sorting with a custom ordering
    #[must_use]
    pub fn sort_by<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sortable = true;
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Hide from exports
    #[must_use]
    pub const fn display_only(mut self) -> Self {
        self.scope = ColumnScope::DisplayOnly;
        self
    }

    /// Hide from the screen
    #[must_use]
    pub const fn export_only(mut self) -> Self {
        self.scope = ColumnScope::ExportOnly;
        self
    }

    /// Column identifier
    pub const fn id(&self) -> &'static str {
        self.id
    }

    /// Header text
    pub const fn header(&self) -> &'static str {
        self.header
    }

    /// Whether the header toggles sorting
    pub const fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// Where the column appears
    pub const fn scope(&self) -> ColumnScope {
        self.scope
    }

    /// Cell value for `row`
    pub fn value(&self, row: &T) -> CellValue {
        (self.accessor)(row)
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        match &self.comparator {
            Some(comparator) => comparator(a, b),
            None => self.value(a).compare(&self.value(b)),
        }
    }

    const fn on_screen(&self) -> bool {
        !matches!(self.scope, ColumnScope::ExportOnly)
    }

    const fn in_export(&self) -> bool {
        !matches!(self.scope, ColumnScope::DisplayOnly)
    }
}

/// Columns that appear in exports, in order
pub fn export_columns<T>(columns: &[Column<T>]) -> Vec<&Column<T>> {
    columns.iter().filter(|c| c.in_export()).collect()
}

/// Columns that appear on screen, in order
pub fn display_columns<T>(columns: &[Column<T>]) -> Vec<&Column<T>> {
    columns.iter().filter(|c| c.on_screen()).collect()
}

/// Single-column client sort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortingState {
    active: Option<(String, SortDirection)>,
}

impl SortingState {
    /// Cycle `column` through unsorted, ascending, descending
    ///
    /// Toggling a different column replaces the previous sort.
    pub fn toggle(&mut self, column: &str) {
        self.active = match self.active.take() {
            Some((current, SortDirection::Asc)) if current == column => {
                Some((current, SortDirection::Desc))
            }
            Some((current, SortDirection::Desc)) if current == column => None,
            _ => Some((column.to_string(), SortDirection::Asc)),
        };
    }

    /// Direction applied to `column`, if it is the sorted one
    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        self.active
            .as_ref()
            .filter(|(id, _)| id == column)
            .map(|(_, direction)| *direction)
    }

    /// Whether nothing is sorted
    pub const fn is_unsorted(&self) -> bool {
        self.active.is_none()
    }

    /// Sort sequence for a remote request
    pub fn to_specs(&self) -> Vec<SortSpec> {
        self.active
            .iter()
            .map(|(field, direction)| SortSpec {
                field: field.clone(),
                direction: *direction,
            })
            .collect()
    }
}

/// Pagination button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    /// Jump to page 1
    First,
    /// One page back
    Prev,
    /// One page forward
    Next,
    /// Jump to the last page
    Last,
}

impl PageAction {
    /// Every button, in display order
    pub const ALL: [Self; 4] = [Self::First, Self::Prev, Self::Next, Self::Last];

    /// Button label
    pub const fn label(self) -> &'static str {
        match self {
            Self::First => "« First",
            Self::Prev => "‹ Prev",
            Self::Next => "Next ›",
            Self::Last => "Last »",
        }
    }
}

/// Pagination footer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationControls {
    /// Current page
    pub page: u32,
    /// Last page, at least 1
    pub total_pages: u32,
    /// Matches before pagination
    pub total: u64,
}

impl PaginationControls {
    /// Footer for `page` of a `total`-row result
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        Self {
            page,
            total_pages: total_pages(total, page_size),
            total,
        }
    }

    /// Whether the button is clickable
    pub const fn is_enabled(&self, action: PageAction) -> bool {
        match action {
            PageAction::First | PageAction::Prev => self.page != 1,
            PageAction::Next | PageAction::Last => self.page != self.total_pages,
        }
    }

    /// Page the button leads to, `None` when disabled
    pub fn target(&self, action: PageAction) -> Option<u32> {
        if !self.is_enabled(action) {
            return None;
        }
        Some(match action {
            PageAction::First => 1,
            PageAction::Prev => self.page.saturating_sub(1).max(1),
            PageAction::Next => self.page.saturating_add(1).min(self.total_pages),
            PageAction::Last => self.total_pages,
        })
    }
}

impl fmt::Display for PaginationControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Page {} of {} • Total {}",
            self.page, self.total_pages, self.total
        )
    }
}

/// Rendered header cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    /// Column identifier
    pub id: &'static str,
    /// Header text
    pub label: &'static str,
    /// Whether clicking toggles sorting
    pub sortable: bool,
    /// Active sort on this column
    pub sorted: Option<SortDirection>,
}

impl fmt::Display for HeaderCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)?;
        match self.sorted {
            Some(SortDirection::Asc) => f.write_str(" ▲"),
            Some(SortDirection::Desc) => f.write_str(" ▼"),
            None => Ok(()),
        }
    }
}

/// Table body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TableBody {
    /// One rendered row per item
    Rows(Vec<Vec<String>>),
    /// Single placeholder row
    Empty(&'static str),
}

/// Output of [`TableView::render`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTable {
    /// Header row
    pub headers: Vec<HeaderCell>,
    /// Body
    pub body: TableBody,
    /// Footer
    pub pagination: PaginationControls,
}

impl RenderedTable {
    /// Number of body rows, counting the placeholder
    pub fn row_count(&self) -> usize {
        match &self.body {
            TableBody::Rows(rows) => rows.len(),
            TableBody::Empty(_) => 1,
        }
    }
}

impl fmt::Display for RenderedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.headers.iter().map(ToString::to_string).collect();
        let mut widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
        if let TableBody::Rows(rows) = &self.body {
            for row in rows {
                for (width, cell) in widths.iter_mut().zip(row) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let pad = width.saturating_sub(cell.chars().count());
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect();
            writeln!(f, "{}", padded.join(" | ").trim_end())
        };

        line(f, &labels)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        match &self.body {
            TableBody::Rows(rows) => {
                for row in rows {
                    line(f, row)?;
                }
            }
            TableBody::Empty(text) => writeln!(f, "{text}")?,
        }
        write!(f, "{}", self.pagination)
    }
}

/// Renderer for one table definition
#[derive(Debug)]
pub struct TableView<'a, T> {
    columns: &'a [Column<T>],
    sorting: Option<&'a SortingState>,
}

impl<'a, T> TableView<'a, T> {
    /// Renderer over `columns`
    pub const fn new(columns: &'a [Column<T>]) -> Self {
        Self {
            columns,
            sorting: None,
        }
    }

    /// Apply a client sort
    #[must_use]
    pub const fn with_sorting(mut self, sorting: &'a SortingState) -> Self {
        self.sorting = Some(sorting);
        self
    }

    /// Rows in display order
    ///
    /// Input order unless a sortable column is sorted; the sort is stable.
    pub fn visible_rows<'r>(&self, items: &'r [T]) -> Vec<&'r T> {
        let mut rows: Vec<&T> = items.iter().collect();
        let Some(sorting) = self.sorting else {
            return rows;
        };
        let sorted = self.columns.iter().find_map(|column| {
            let direction = sorting.direction_of(column.id)?;
            column.sortable.then_some((column, direction))
        });
        if let Some((column, direction)) = sorted {
            rows.sort_by(|a, b| direction.apply(column.compare(a, b)));
        }
        rows
    }

    /// Render the current page
    pub fn render(&self, items: &[T], page: u32, page_size: u32, total: u64) -> RenderedTable {
        let columns = display_columns(self.columns);
        let headers = columns
            .iter()
            .map(|column| HeaderCell {
                id: column.id,
                label: column.header,
                sortable: column.sortable,
                sorted: self.sorting.and_then(|s| s.direction_of(column.id)),
            })
            .collect();

        let body = if items.is_empty() {
            TableBody::Empty(EMPTY_BODY)
        } else {
            TableBody::Rows(
                self.visible_rows(items)
                    .into_iter()
                    .map(|row| columns.iter().map(|c| c.value(row).to_string()).collect())
                    .collect(),
            )
        };

        RenderedTable {
            headers,
            body,
            pagination: PaginationControls::new(page, page_size, total),
        }
    }
}
