//! Query-state and data-table engine for the learning platform admin console
//!
//! This crate holds everything between the remote admin services and what an
//! operator sees: normalized query parameters, a keyed list cache with
//! optimistic writes, column-driven tables, CSV and PDF export, detail
//! overlays, toasts, the operator session and the tabbed dashboard shell.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::significant_drop_tightening,
    clippy::future_not_send
)]

pub mod cache;
pub mod error;
pub mod export;
pub mod overlay;
pub mod query;
pub mod session;
pub mod shell;
pub mod table;
pub mod toast;
pub mod views;

// Re-export commonly used types
pub use cache::{CacheHub, CacheStats, DataCache};
pub use error::{ConsoleError, Result};
pub use export::{ExportArtifact, ExportFormat, ExportScope, ExportTable, PdfLayout};
pub use overlay::{DetailResource, DetailState};
pub use query::{CacheKey, FilterValue, PageSize, QueryParams, QueryPatch, QueryStore};
pub use session::{SessionManager, SessionStore, StoredSession};
pub use shell::{ActiveView, DashboardShell, Tab};
pub use table::{Column, PageAction, PaginationControls, RenderedTable, SortingState, TableView};
pub use toast::{NotificationBus, Toast};
pub use views::{NotificationFeed, ViewContext};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_re_exports() {
        let _store = QueryStore::new(PageSize::default());
        let _sorting = SortingState::default();
        let _hub = CacheHub::new();

        let err = ConsoleError::not_found("user u_0");
        assert_eq!(err.title(), ConsoleError::not_found("x").title());
        assert_eq!(Tab::default(), Tab::Users);
    }
}
