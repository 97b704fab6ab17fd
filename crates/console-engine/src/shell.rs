//! Composite dashboard shell
//!
//! Owns the shared search text and date range, and the one view that is
//! active. Shared values flow one way, from the shell into the view: a view
//! may edit its local search without the shell noticing.

use crate::error::{ConsoleError, Result};
use crate::export::{ExportArtifact, ExportFormat, ExportScope};
use crate::table::RenderedTable;
use crate::views::{
    AnalyticsView, PaymentsView, StudentProgressView, TeacherManagement, UserManagement,
    ViewContext,
};
use chrono::Utc;
use console_core::DateRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Days covered by the default date range
const DEFAULT_RANGE_DAYS: i64 = 30;

/// Dashboard tab
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    /// User management
    #[default]
    Users,
    /// Student progress
    Students,
    /// Payments and subscriptions
    Payments,
    /// Teacher management
    Teachers,
    /// Analytics and reports
    Analytics,
}

impl Tab {
    /// Every tab in display order
    pub const ALL: [Self; 5] = [
        Self::Users,
        Self::Students,
        Self::Payments,
        Self::Teachers,
        Self::Analytics,
    ];

    /// URL identifier
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Students => "students",
            Self::Payments => "payments",
            Self::Teachers => "teachers",
            Self::Analytics => "analytics",
        }
    }

    /// Tab caption
    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "User Management",
            Self::Students => "Student Progress",
            Self::Payments => "Payments & Subscriptions",
            Self::Teachers => "Admin / Teacher Management",
            Self::Analytics => "Analytics & Reports",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| ConsoleError::validation("tab", format!("unknown tab '{s}'")))
    }
}

/// The view behind the active tab
#[derive(Debug)]
pub enum ActiveView {
    /// User management
    Users(UserManagement),
    /// Student progress
    Students(StudentProgressView),
    /// Payments and subscriptions
    Payments(PaymentsView),
    /// Teacher management
    Teachers(TeacherManagement),
    /// Analytics and reports
    Analytics(AnalyticsView),
}

impl ActiveView {
    fn build(ctx: &ViewContext, tab: Tab, search: &str, date_range: DateRange) -> Self {
        let ctx = ctx.clone();
        match tab {
            Tab::Users => Self::Users(UserManagement::new(ctx, search)),
            Tab::Students => Self::Students(StudentProgressView::new(ctx, search)),
            Tab::Payments => Self::Payments(PaymentsView::new(ctx, search, date_range)),
            Tab::Teachers => Self::Teachers(TeacherManagement::new(ctx, search)),
            Tab::Analytics => Self::Analytics(AnalyticsView::new(ctx, date_range)),
        }
    }

    /// Tab this view belongs to
    pub const fn tab(&self) -> Tab {
        match self {
            Self::Users(_) => Tab::Users,
            Self::Students(_) => Tab::Students,
            Self::Payments(_) => Tab::Payments,
            Self::Teachers(_) => Tab::Teachers,
            Self::Analytics(_) => Tab::Analytics,
        }
    }

    fn push_search(&mut self, search: &str) {
        match self {
            Self::Users(view) => view.table_mut().set_search(search),
            Self::Students(view) => view.table_mut().set_search(search),
            Self::Payments(view) => view.table_mut().set_search(search),
            Self::Teachers(view) => view.table_mut().set_search(search),
            Self::Analytics(_) => {}
        }
    }

    fn push_date_range(&mut self, range: DateRange) {
        match self {
            Self::Payments(view) => view.set_date_range(range),
            Self::Analytics(view) => view.set_date_range(range),
            Self::Users(_) | Self::Students(_) | Self::Teachers(_) => {}
        }
    }

    /// Fetch the table and any cards of the view
    ///
    /// # Errors
    ///
    /// Returns the first remote failure.
    pub async fn load(&mut self) -> Result<()> {
        match self {
            Self::Users(view) => view.load().await,
            Self::Students(view) => {
                view.load().await?;
                view.load_summary().await.map(|_| ())
            }
            Self::Payments(view) => {
                view.load().await?;
                view.load_overview().await.map(|_| ())
            }
            Self::Teachers(view) => view.load().await,
            Self::Analytics(view) => view.load().await.map(|_| ()),
        }
    }

    /// Rendered table, `None` for analytics
    pub fn render(&self) -> Option<RenderedTable> {
        match self {
            Self::Users(view) => Some(view.render()),
            Self::Students(view) => Some(view.render()),
            Self::Payments(view) => Some(view.render()),
            Self::Teachers(view) => Some(view.render()),
            Self::Analytics(_) => None,
        }
    }

    /// Export the view; analytics yields one file per dataset
    ///
    /// # Errors
    ///
    /// Returns the remote failure of a page fetch, or an export error.
    pub async fn export(
        &mut self,
        format: ExportFormat,
        scope: ExportScope,
    ) -> Result<Vec<ExportArtifact>> {
        match self {
            Self::Users(view) => view.export(format, scope).await.map(|a| vec![a]),
            Self::Students(view) => view.export(format, scope).await.map(|a| vec![a]),
            Self::Payments(view) => view.export(format, scope).await.map(|a| vec![a]),
            Self::Teachers(view) => view.export(format, scope).await.map(|a| vec![a]),
            Self::Analytics(view) => view.exports(format).await,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UrlState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<String>,
}

/// Tabbed dashboard
#[derive(Debug)]
pub struct DashboardShell {
    ctx: ViewContext,
    search: String,
    date_range: DateRange,
    active: ActiveView,
}

impl DashboardShell {
    /// Shell on the users tab with an empty search and the last 30 days
    pub fn new(ctx: ViewContext) -> Self {
        Self::with_state(ctx, Tab::Users, String::new())
    }

    fn with_state(ctx: ViewContext, tab: Tab, search: String) -> Self {
        let date_range = DateRange::last_days(Utc::now(), DEFAULT_RANGE_DAYS);
        let active = ActiveView::build(&ctx, tab, &search, date_range);
        Self {
            ctx,
            search,
            date_range,
            active,
        }
    }

    /// Shell restored from a URL query string such as `tab=payments&q=asha`
    ///
    /// An unknown or missing tab falls back to users.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed query string.
    pub fn from_url_query(ctx: ViewContext, query: &str) -> Result<Self> {
        let state: UrlState = serde_urlencoded::from_str(query.trim_start_matches('?'))
            .map_err(|e| ConsoleError::validation("url", e.to_string()))?;
        let tab = match state.tab.as_deref() {
            Some(raw) => raw.parse().unwrap_or_else(|err: ConsoleError| {
                warn!(error = %err, "Falling back to the users tab");
                Tab::Users
            }),
            None => Tab::Users,
        };
        Ok(Self::with_state(ctx, tab, state.q.unwrap_or_default()))
    }

    /// URL query string reflecting the tab and the search text
    ///
    /// # Errors
    ///
    /// Returns a validation error if the state cannot be encoded.
    pub fn url_query(&self) -> Result<String> {
        let state = UrlState {
            tab: Some(self.tab().as_str().to_string()),
            q: (!self.search.is_empty()).then(|| self.search.clone()),
        };
        serde_urlencoded::to_string(&state).map_err(|e| ConsoleError::validation("url", e.to_string()))
    }

    /// Active tab
    pub const fn tab(&self) -> Tab {
        self.active.tab()
    }

    /// Shared search text
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Shared date range
    pub const fn date_range(&self) -> DateRange {
        self.date_range
    }

    /// The active view
    pub const fn active(&self) -> &ActiveView {
        &self.active
    }

    /// The active view, for local edits
    pub const fn active_mut(&mut self) -> &mut ActiveView {
        &mut self.active
    }

    /// Switch tabs; the new view starts from the shared values
    pub fn select_tab(&mut self, tab: Tab) {
        if tab != self.tab() {
            debug!(%tab, "Switching tab");
            self.active = ActiveView::build(&self.ctx, tab, &self.search, self.date_range);
        }
    }

    /// Change the shared search and push it into the active view
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.active.push_search(&self.search);
    }

    /// Change the shared date range and push it into the active view
    pub fn set_date_range(&mut self, range: DateRange) {
        self.date_range = range;
        self.active.push_date_range(range);
    }

    /// Load the active view
    ///
    /// # Errors
    ///
    /// Returns the first remote failure.
    pub async fn load_active(&mut self) -> Result<()> {
        self.active.load().await
    }
}
