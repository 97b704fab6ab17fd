//! Request and response types of the remote collaborator contracts

use console_core::types::{ActivityLog, NotificationType, PaymentStatus, Severity};
use console_core::{DateRange, EntityId, NotificationItem, Role};
use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// Apply the direction to an ascending ordering
    pub const fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// One entry of an ordered sort sequence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SortSpec {
    /// Field identifier, e.g. `name` or `last_login_at`
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 1-based page window over a filtered list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageWindow {
    /// Page number (1-based)
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl PageWindow {
    /// Create a window
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Index of the first item on the page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }

    /// Items of `list` that fall on this page
    pub fn slice<T: Clone>(&self, list: &[T]) -> Vec<T> {
        let start = self.offset().min(list.len());
        let end = start.saturating_add(self.page_size as usize).min(list.len());
        list[start..end].to_vec()
    }

    /// Whether items exist after this page
    pub fn has_next(&self, total: u64) -> bool {
        (self.offset() as u64).saturating_add(u64::from(self.page_size)) < total
    }
}

/// Account status filter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatusFilter {
    /// No filtering
    #[default]
    All,
    /// Only active accounts
    Active,
    /// Only suspended accounts
    Suspended,
}

impl AccountStatusFilter {
    /// Whether an account with the given activity passes the filter
    pub const fn matches(self, is_active: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => is_active,
            Self::Suspended => !is_active,
        }
    }
}

/// Parameters of `list_users`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserListParams {
    /// Page window
    #[serde(flatten)]
    pub window: PageWindow,
    /// Case-insensitive match on name or email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Role filter, `None` for all roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Account status filter
    #[serde(default)]
    pub status: AccountStatusFilter,
    /// Sort sequence, applied in order
    #[serde(default)]
    pub sort: Vec<SortSpec>,
}

impl UserListParams {
    /// First page of all users
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self {
            window: PageWindow::new(page, page_size),
            search: None,
            role: None,
            status: AccountStatusFilter::All,
            sort: Vec::new(),
        }
    }
}

/// Parameters of `list_transactions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionListParams {
    /// Page window
    #[serde(flatten)]
    pub window: PageWindow,
    /// Case-insensitive match on payer name or email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Status filter, `None` for all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    /// Inclusive lower amount bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<u64>,
    /// Inclusive upper amount bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<u64>,
    /// Inclusive date window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl TransactionListParams {
    /// Unfiltered page
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self {
            window: PageWindow::new(page, page_size),
            search: None,
            status: None,
            min_amount: None,
            max_amount: None,
            date_range: None,
        }
    }
}

/// Parameters of `list_teachers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeacherListParams {
    /// Page window
    #[serde(flatten)]
    pub window: PageWindow,
    /// Case-insensitive match on name or email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl TeacherListParams {
    /// Unfiltered page
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self {
            window: PageWindow::new(page, page_size),
            search: None,
        }
    }
}

/// Derived progress for one row of a user page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentProgressEntry {
    /// User the value belongs to
    pub user_id: EntityId,
    /// Completion percentage, `None` for non-students
    pub progress: Option<u8>,
}

/// Side table returned next to a list page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum Auxiliary {
    /// Per-row student progress
    StudentProgress(Vec<StudentProgressEntry>),
}

impl Auxiliary {
    /// Progress for a user id, flattened to `None` when absent
    pub fn progress_for(&self, user_id: &str) -> Option<u8> {
        match self {
            Self::StudentProgress(entries) => entries
                .iter()
                .find(|entry| entry.user_id == user_id)
                .and_then(|entry| entry.progress),
        }
    }
}

/// One page of a remote list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListResponse<T> {
    /// Items on the page, at most `page_size`
    pub items: Vec<T>,
    /// Matches before pagination
    pub total: u64,
    /// Optional side table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Auxiliary>,
}

impl<T> ListResponse<T> {
    /// Page without a side table
    pub const fn new(items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            total,
            auxiliary: None,
        }
    }

    /// Attach a side table
    #[must_use]
    pub fn with_auxiliary(mut self, auxiliary: Auxiliary) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }
}

/// Acknowledgement of a write
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationAck {
    /// Whether the write was applied
    pub success: bool,
}

/// Acknowledgement of a notification update
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    /// Always `true` on success
    pub ok: bool,
}

/// Result of `send_magic_link`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MagicLinkReceipt {
    /// Always `true` on success
    pub sent: bool,
}

/// Teacher activity log response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLogPage {
    /// Log lines
    pub items: Vec<ActivityLog>,
}

/// Query of the notification feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationQuery {
    /// Id of the last item seen, absent for the first page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Page size
    pub limit: usize,
    /// Only unread items
    #[serde(default)]
    pub unread: bool,
    /// Case-insensitive match on title or body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Category filter, `None` for all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationType>,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 10,
            unread: false,
            q: None,
            kind: None,
        }
    }
}

impl NotificationQuery {
    /// Same query continued after `cursor`
    #[must_use]
    pub fn after(&self, cursor: Option<String>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

/// One page of the notification feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPage {
    /// Items, newest first
    pub items: Vec<NotificationItem>,
    /// Id of the last item, present only when more items match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Partial notification for simulated background delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationDraft {
    /// Headline, defaults to `System update`
    pub title: Option<String>,
    /// Detail, defaults to `Background task completed`
    pub body: Option<String>,
    /// Category, defaults to system
    pub kind: Option<NotificationType>,
    /// Severity, defaults to info
    pub severity: Option<Severity>,
    /// Optional link
    pub link: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_page_window_offset_and_slice() {
        let list: Vec<u32> = (1..=25).collect();

        assert_eq!(PageWindow::new(1, 10).slice(&list), (1..=10).collect::<Vec<_>>());
        assert_eq!(PageWindow::new(3, 10).slice(&list), vec![21, 22, 23, 24, 25]);
        assert!(PageWindow::new(4, 10).slice(&list).is_empty());
        assert!(!PageWindow::new(3, 10).has_next(25));
        assert!(PageWindow::new(2, 10).has_next(25));
    }

    #[test]
    fn test_auxiliary_progress_lookup() {
        let aux = Auxiliary::StudentProgress(vec![
            StudentProgressEntry {
                user_id: "u_1".to_string(),
                progress: Some(64),
            },
            StudentProgressEntry {
                user_id: "u_15".to_string(),
                progress: None,
            },
        ]);

        assert_eq!(aux.progress_for("u_1"), Some(64));
        assert_eq!(aux.progress_for("u_15"), None);
        assert_eq!(aux.progress_for("u_99"), None);
    }

    #[test]
    fn test_params_serialization_is_stable() {
        let mut params = UserListParams::new(2, 20);
        params.role = Some(Role::Teacher);
        params.sort = vec![SortSpec::desc("last_login_at")];

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(
            json,
            r#"{"page":2,"page_size":20,"role":"teacher","status":"all","sort":[{"field":"last_login_at","direction":"desc"}]}"#
        );
    }

    #[test]
    fn test_notification_query_defaults() {
        let query = NotificationQuery::default();
        assert_eq!(query.limit, 10);
        assert!(!query.unread);
        assert_eq!(query.after(Some("n_9".into())).cursor.as_deref(), Some("n_9"));
    }

    proptest! {
        #[test]
        fn prop_page_slice_length(
            total in 0usize..300,
            size_index in 0usize..3,
            page_seed in 0u32..1000,
        ) {
            let page_size = [10u32, 20, 50][size_index];
            let pages = u32::try_from(total.div_ceil(page_size as usize).max(1)).unwrap();
            let page = page_seed % pages + 1;
            let list: Vec<usize> = (0..total).collect();

            let items = PageWindow::new(page, page_size).slice(&list);
            let skipped = (page as usize - 1) * page_size as usize;
            let expected = (page_size as usize).min(total.saturating_sub(skipped));
            prop_assert_eq!(items.len(), expected);
        }
    }
}
