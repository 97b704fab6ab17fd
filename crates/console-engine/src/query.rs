//! Query-state store for one table view
//!
//! A [`QueryStore`] holds the page, page size, search text, sort sequence and
//! named filters of a view. Changing anything other than the page sends the
//! view back to page 1. The whole state serializes deterministically into a
//! [`CacheKey`].

use crate::error::{ConsoleError, Result};
use console_core::DateRange;
use console_core::config::ALLOWED_PAGE_SIZES;
use console_service::SortSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Allowed table page sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum PageSize {
    /// Ten rows
    #[default]
    Ten,
    /// Twenty rows
    Twenty,
    /// Fifty rows
    Fifty,
}

impl PageSize {
    /// Every allowed size, smallest first
    pub const ALL: [Self; 3] = [Self::Ten, Self::Twenty, Self::Fifty];

    /// Rows per page
    pub const fn get(self) -> u32 {
        match self {
            Self::Ten => ALLOWED_PAGE_SIZES[0],
            Self::Twenty => ALLOWED_PAGE_SIZES[1],
            Self::Fifty => ALLOWED_PAGE_SIZES[2],
        }
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

impl TryFrom<u32> for PageSize {
    type Error = ConsoleError;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.get() == value)
            .ok_or_else(|| {
                ConsoleError::validation(
                    "page_size",
                    format!("{value} is not one of {ALLOWED_PAGE_SIZES:?}"),
                )
            })
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Value of a named filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Free text or an enumerated choice such as `suspended`
    Text(String),
    /// Numeric bound
    Number(u64),
    /// Time window
    DateRange(DateRange),
}

impl FilterValue {
    /// Text content, if this is a text filter
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric content, if this is a numeric filter
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Date window, if this is a date filter
    pub const fn as_date_range(&self) -> Option<DateRange> {
        match self {
            Self::DateRange(range) => Some(*range),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<u64> for FilterValue {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

impl From<DateRange> for FilterValue {
    fn from(range: DateRange) -> Self {
        Self::DateRange(range)
    }
}

/// Full query state of one table view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Current page, 1-based
    pub page: u32,
    /// Rows per page
    pub page_size: PageSize,
    /// Free-text search
    pub search: String,
    /// Sort sequence, order significant
    pub sort: Vec<SortSpec>,
    /// Named filters, serialized in key order
    pub filters: BTreeMap<String, FilterValue>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PageSize::default(),
            search: String::new(),
            sort: Vec::new(),
            filters: BTreeMap::new(),
        }
    }
}

impl QueryParams {
    /// Named filter value
    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }

    /// Search text, `None` when blank
    pub fn search_term(&self) -> Option<String> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Partial update of [`QueryParams`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    /// New page
    pub page: Option<u32>,
    /// New page size
    pub page_size: Option<PageSize>,
    /// New search text
    pub search: Option<String>,
    /// New sort sequence
    pub sort: Option<Vec<SortSpec>>,
    /// Filter updates; `None` removes the filter
    pub filters: Vec<(String, Option<FilterValue>)>,
}

impl QueryPatch {
    /// Set the page
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the page size
    #[must_use]
    pub const fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Set the search text
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set the sort sequence
    #[must_use]
    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set a named filter
    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.push((name.into(), Some(value.into())));
        self
    }

    /// Remove a named filter
    #[must_use]
    pub fn clear_filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push((name.into(), None));
        self
    }

    /// Whether the patch touches anything besides the page
    pub fn resets_page(&self) -> bool {
        self.page_size.is_some()
            || self.search.is_some()
            || self.sort.is_some()
            || !self.filters.is_empty()
    }
}

/// Number of pages needed for `total` rows, never less than one
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let pages = total.div_ceil(u64::from(page_size.max(1))).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Query state of one view
#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    params: QueryParams,
}

impl QueryStore {
    /// Store starting at page 1 with `page_size` rows
    pub fn new(page_size: PageSize) -> Self {
        Self {
            params: QueryParams {
                page_size,
                ..QueryParams::default()
            },
        }
    }

    /// Store starting from explicit params
    pub const fn with_params(params: QueryParams) -> Self {
        Self { params }
    }

    /// Current state
    pub const fn get(&self) -> &QueryParams {
        &self.params
    }

    /// Apply a partial update
    ///
    /// Any field other than `page` resets the page to 1, even when the patch
    /// also names a page.
    ///
    /// # Errors
    ///
    /// Returns a validation error for page 0; the state is left unchanged.
    pub fn set(&mut self, patch: QueryPatch) -> Result<&QueryParams> {
        if patch.page == Some(0) {
            return Err(ConsoleError::validation("page", "pages start at 1"));
        }
        Ok(self.apply(patch))
    }

    fn apply(&mut self, patch: QueryPatch) -> &QueryParams {
        let resets_page = patch.resets_page();
        let QueryPatch {
            page,
            page_size,
            search,
            sort,
            filters,
        } = patch;

        if let Some(page) = page {
            self.params.page = page;
        }
        if let Some(page_size) = page_size {
            self.params.page_size = page_size;
        }
        if let Some(search) = search {
            self.params.search = search;
        }
        if let Some(sort) = sort {
            self.params.sort = sort;
        }
        for (name, value) in filters {
            match value {
                Some(value) => {
                    self.params.filters.insert(name, value);
                }
                None => {
                    self.params.filters.remove(&name);
                }
            }
        }
        if resets_page {
            self.params.page = 1;
        }

        &self.params
    }

    /// Move to `page`
    ///
    /// # Errors
    ///
    /// Returns a validation error for page 0.
    pub fn set_page(&mut self, page: u32) -> Result<&QueryParams> {
        self.set(QueryPatch::default().page(page))
    }

    /// Change the page size
    pub fn set_page_size(&mut self, size: PageSize) -> &QueryParams {
        self.apply(QueryPatch::default().page_size(size))
    }

    /// Change the search text
    pub fn set_search(&mut self, search: impl Into<String>) -> &QueryParams {
        self.apply(QueryPatch::default().search(search))
    }

    /// Replace the sort sequence
    pub fn set_sort(&mut self, sort: Vec<SortSpec>) -> &QueryParams {
        self.apply(QueryPatch::default().sort(sort))
    }

    /// Set a named filter
    pub fn set_filter(&mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> &QueryParams {
        self.apply(QueryPatch::default().filter(name, value))
    }

    /// Remove a named filter
    pub fn clear_filter(&mut self, name: impl Into<String>) -> &QueryParams {
        self.apply(QueryPatch::default().clear_filter(name))
    }

    /// Clamp the page into `[1, total_pages]` for a result of `total` rows
    ///
    /// Returns `true` when the page changed.
    pub fn clamp_page(&mut self, total: u64) -> bool {
        let last = total_pages(total, self.params.page_size.get());
        let clamped = self.params.page.clamp(1, last);
        let changed = clamped != self.params.page;
        self.params.page = clamped;
        changed
    }

    /// Cache key of the current state
    pub fn cache_key(&self, scope: &str) -> CacheKey {
        CacheKey::new(scope, &self.params)
    }
}

/// Deterministic cache key: scope plus serialized query state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    scope: String,
    params: String,
}

impl CacheKey {
    /// Key for `params` within `scope` (e.g. `users`)
    ///
    /// Filters serialize in name order, so insertion order never matters;
    /// the sort sequence keeps its order.
    pub fn new<P: Serialize + fmt::Debug>(scope: &str, params: &P) -> Self {
        let params = serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"));
        Self {
            scope: scope.to_string(),
            params,
        }
    }

    /// Entity family the key belongs to
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Serialized query state
    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.params)
    }
}
