//! Payments and subscriptions view

use super::{TableState, ViewContext, collect_pages};
use crate::error::{ConsoleError, Result};
use crate::export::{ExportArtifact, ExportFormat, ExportScope, export_rows};
use crate::query::{FilterValue, QueryParams};
use crate::table::{Column, RenderedTable, TableView};
use console_core::types::{PaymentStatus, RevenueSummary};
use console_core::utils::{format_date, format_inr};
use console_core::{DateRange, Transaction};
use console_service::{AdminService, ListResponse, ServiceResult, TransactionListParams};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Cache scope of the transaction table
pub const SCOPE: &str = "transactions";

const STATUS_FILTER: &str = "status";
const MIN_AMOUNT_FILTER: &str = "min_amount";
const MAX_AMOUNT_FILTER: &str = "max_amount";
const DATE_RANGE_FILTER: &str = "date_range";

fn transaction_columns() -> Vec<Column<Transaction>> {
    vec![
        Column::new("name", "Student Name", |t: &Transaction| t.name.clone()),
        Column::new("email", "Email", |t: &Transaction| t.email.clone()),
        Column::new("status", "Status", |t: &Transaction| t.status.to_string().to_uppercase()),
        Column::new("amount", "Amount", |t: &Transaction| format_inr(t.amount_inr)),
        Column::new("date", "Date", |t: &Transaction| format_date(t.date)),
    ]
}

/// Parse an amount input; blank means "no bound"
fn parse_amount(field: &str, input: &str) -> Result<Option<u64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConsoleError::validation(field, "must be a number"))
}

/// Translate the table's query state into a `list_transactions` request
pub fn transaction_list_params(params: &QueryParams) -> TransactionListParams {
    let mut request = TransactionListParams::new(params.page, params.page_size.get());
    request.search = params.search_term();
    request.status = match params.filter(STATUS_FILTER).and_then(FilterValue::as_text) {
        Some("success") => Some(PaymentStatus::Success),
        Some("failed") => Some(PaymentStatus::Failed),
        _ => None,
    };
    request.min_amount = params.filter(MIN_AMOUNT_FILTER).and_then(FilterValue::as_number);
    request.max_amount = params.filter(MAX_AMOUNT_FILTER).and_then(FilterValue::as_number);
    request.date_range = params
        .filter(DATE_RANGE_FILTER)
        .and_then(FilterValue::as_date_range);
    request
}

fn transaction_fetcher(
    admin: Arc<dyn AdminService>,
) -> impl Fn(QueryParams) -> BoxFuture<'static, ServiceResult<ListResponse<Transaction>>> {
    move |params| {
        let admin = Arc::clone(&admin);
        let request = transaction_list_params(&params);
        async move { admin.list_transactions(&request).await }.boxed()
    }
}

/// Revenue cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueCards {
    /// Revenue in the last month of the range, formatted
    pub monthly: String,
    /// Revenue over all time, formatted
    pub lifetime: String,
    /// Subscriptions currently active
    pub active_subscriptions: u64,
    /// Failed payments in the range
    pub failed_payments: u64,
}

impl From<&RevenueSummary> for RevenueCards {
    fn from(summary: &RevenueSummary) -> Self {
        Self {
            monthly: format_inr(summary.monthly_revenue_inr),
            lifetime: format_inr(summary.lifetime_revenue_inr),
            active_subscriptions: summary.active_subscriptions,
            failed_payments: summary.failed_payments,
        }
    }
}

/// Payments overview
#[derive(Debug)]
pub struct PaymentsView {
    ctx: ViewContext,
    table: TableState<Transaction>,
    columns: Vec<Column<Transaction>>,
    date_range: DateRange,
    overview: Option<RevenueSummary>,
}

impl PaymentsView {
    /// View seeded with the shell's search text and date range
    pub fn new(ctx: ViewContext, search: &str, date_range: DateRange) -> Self {
        let mut table = TableState::new(SCOPE, ctx.page_size());
        table.set_search(search);
        table.set_filter(DATE_RANGE_FILTER, date_range);
        Self {
            ctx,
            table,
            columns: transaction_columns(),
            date_range,
            overview: None,
        }
    }

    /// Query state and current page
    pub const fn table(&self) -> &TableState<Transaction> {
        &self.table
    }

    /// Mutable query state for paging, page size and search
    pub const fn table_mut(&mut self) -> &mut TableState<Transaction> {
        &mut self.table
    }

    /// Restrict to one outcome, `None` for all
    pub fn set_status_filter(&mut self, status: Option<PaymentStatus>) {
        match status {
            Some(PaymentStatus::Success) => self.table.set_filter(STATUS_FILTER, "success"),
            Some(PaymentStatus::Failed) => self.table.set_filter(STATUS_FILTER, "failed"),
            None => self.table.clear_filter(STATUS_FILTER),
        }
    }

    fn set_amount_bound(&mut self, filter: &str, input: &str) -> Result<()> {
        match parse_amount(filter, input)? {
            Some(amount) => self.table.set_filter(filter, amount),
            None => self.table.clear_filter(filter),
        }
        Ok(())
    }

    /// Set the inclusive lower amount bound from text input
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-numeric input; the filter is left
    /// unchanged.
    pub fn set_min_amount(&mut self, input: &str) -> Result<()> {
        self.set_amount_bound(MIN_AMOUNT_FILTER, input)
    }

    /// Set the inclusive upper amount bound from text input
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-numeric input; the filter is left
    /// unchanged.
    pub fn set_max_amount(&mut self, input: &str) -> Result<()> {
        self.set_amount_bound(MAX_AMOUNT_FILTER, input)
    }

    /// Shared date range
    pub const fn date_range(&self) -> DateRange {
        self.date_range
    }

    /// Replace the date range; the revenue cards are reloaded on next request
    pub fn set_date_range(&mut self, range: DateRange) {
        if range != self.date_range {
            self.date_range = range;
            self.overview = None;
            self.table.set_filter(DATE_RANGE_FILTER, range);
        }
    }

    /// Fetch the current page
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load(&mut self) -> Result<()> {
        let fetch = transaction_fetcher(Arc::clone(&self.ctx.admin));
        self.table.load(&self.ctx.caches.transactions, fetch).await?;
        Ok(())
    }

    /// Fetch the revenue cards for the date range
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load_overview(&mut self) -> Result<RevenueCards> {
        let summary = self.ctx.admin.revenue_overview(&self.date_range).await?;
        debug!(?summary, "Revenue overview loaded");
        self.overview = Some(summary);
        Ok(RevenueCards::from(&summary))
    }

    /// Revenue cards, zeroed until loaded
    pub fn overview(&self) -> RevenueCards {
        RevenueCards::from(&self.overview.unwrap_or(RevenueSummary {
            monthly_revenue_inr: 0,
            lifetime_revenue_inr: 0,
            active_subscriptions: 0,
            failed_payments: 0,
        }))
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

    /// Export the rows on screen
    ///
    /// # Errors
    ///
    /// Returns an export error if rendering fails.
    pub fn export_visible_page(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let visible = TableView::new(&self.columns).visible_rows(self.table.items());
        export_rows(
            format,
            &visible,
            &self.columns,
            "transactions",
            "Transactions",
            self.ctx.pdf_layout(),
        )
    }

    /// Export every transaction matching the current filters
    ///
    /// # Errors
    ///
    /// Returns the remote failure of any page, or an export error.
    pub async fn export_full_filtered_set(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let fetch = transaction_fetcher(Arc::clone(&self.ctx.admin));
        let pages =
            collect_pages(&self.ctx.caches.transactions, SCOPE, self.table.query(), fetch).await?;
        let rows: Vec<&Transaction> = pages.iter().flat_map(|page| page.items.iter()).collect();
        export_rows(
            format,
            &rows,
            &self.columns,
            "transactions-all",
            "Transactions",
            self.ctx.pdf_layout(),
        )
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
    use crate::table::TableBody;
    use crate::views::test_support;
    use chrono::{Duration, Utc};
    use console_service::MockBackend;
    use pretty_assertions::assert_eq;

    fn wide_range() -> DateRange {
        DateRange::last_days(Utc::now() + Duration::days(1), 3650)
    }

    async fn loaded() -> (PaymentsView, MockBackend) {
        let (ctx, backend) = test_support::context(Utc::now());
        let mut view = PaymentsView::new(ctx, "", wide_range());
        view.load().await.unwrap();
        (view, backend)
    }

    #[tokio::test]
    async fn test_display_formats_status_and_amount() {
        let (view, _backend) = loaded().await;
        let rendered = view.render();
        let headers: Vec<&str> = rendered.headers.iter().map(|h| h.label).collect();
        assert_eq!(headers, vec!["Student Name", "Email", "Status", "Amount", "Date"]);

        let TableBody::Rows(rows) = rendered.body else {
            panic!("expected rows");
        };
        for (row, tx) in rows.iter().zip(view.table().items()) {
            assert_eq!(row[2], tx.status.to_string().to_uppercase());
            assert_eq!(row[3], format_inr(tx.amount_inr));
        }
    }

    #[tokio::test]
    async fn test_status_filter() {
        let (mut view, _backend) = loaded().await;
        view.table_mut().set_page(2).unwrap();
        view.set_status_filter(Some(PaymentStatus::Failed));
        assert_eq!(view.table().query().page, 1);

        view.load().await.unwrap();
        assert!(view.table().items().iter().all(|t| t.status == PaymentStatus::Failed));
    }

    #[tokio::test]
    async fn test_amount_inputs() {
        let (mut view, _backend) = loaded().await;

        let err = view.set_min_amount("abc").unwrap_err();
        assert_eq!(err, ConsoleError::validation("min_amount", "must be a number"));
        assert!(view.table().query().filter(MIN_AMOUNT_FILTER).is_none());

        view.set_min_amount(" 1000 ").unwrap();
        view.set_max_amount("2000").unwrap();
        view.load().await.unwrap();
        assert!(
            view.table()
                .items()
                .iter()
                .all(|t| (1000..=2000).contains(&t.amount_inr))
        );

        view.set_min_amount("").unwrap();
        assert!(view.table().query().filter(MIN_AMOUNT_FILTER).is_none());
    }

    #[tokio::test]
    async fn test_date_range_is_part_of_the_query() {
        let (mut view, backend) = loaded().await;
        let wide_total = view.table().total();

        view.set_date_range(DateRange::last_days(Utc::now(), 1));
        view.load().await.unwrap();
        assert!(view.table().total() <= wide_total);
        assert_eq!(backend.admin.call_count("list_transactions"), 2);
    }

    #[tokio::test]
    async fn test_overview_cards() {
        let (mut view, _backend) = loaded().await;
        assert_eq!(view.overview().monthly, "₹0");

        let cards = view.load_overview().await.unwrap();
        assert!(cards.lifetime.starts_with('₹'));
        assert_eq!(view.overview(), cards);
    }

    #[tokio::test]
    async fn test_export_matches_displayed_cells() {
        let (view, _backend) = loaded().await;
        let artifact = view.export_visible_page(ExportFormat::Csv).unwrap();
        assert_eq!(artifact.filename, "transactions.csv");

        let mut reader = csv::Reader::from_reader(artifact.bytes.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, vec!["Student Name", "Email", "Status", "Amount", "Date"]);
        let exported: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect();

        let TableBody::Rows(screen) = view.render().body else {
            panic!("expected rows");
        };
        assert_eq!(exported, screen);
    }

    #[tokio::test]
    async fn test_full_export_row_count() {
        let (view, _backend) = loaded().await;
        let artifact = view
            .export(ExportFormat::Csv, ExportScope::FullFilteredSet)
            .await
            .unwrap();
        let csv = String::from_utf8(artifact.bytes).unwrap();
        assert_eq!(csv.lines().count() as u64, view.table().total() + 1);
    }
}
