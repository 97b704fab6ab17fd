//! Detail overlay with a stale-response guard
//!
//! Selecting an entity issues a ticket. A fetch result is applied only when
//! its ticket is still current, so a slow response for an earlier selection
//! never replaces the entity on display.

use crate::error::{ConsoleError, Result};
use console_service::ServiceResult;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Selection ticket
pub type Ticket = u64;

/// What the overlay shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState<D> {
    /// Closed
    Idle,
    /// Fetch in flight for `id`
    Loading {
        /// Selected entity
        id: String,
        /// Ticket of the in-flight fetch
        ticket: Ticket,
    },
    /// Detail on display
    Loaded {
        /// Selected entity
        id: String,
        /// Fetched detail
        data: Arc<D>,
    },
    /// Fetch failed; the list view is unaffected
    Failed {
        /// Selected entity
        id: String,
        /// Classified failure
        error: ConsoleError,
    },
}

impl<D> DetailState<D> {
    /// Entity currently selected
    pub fn selected_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { id, .. } | Self::Loaded { id, .. } | Self::Failed { id, .. } => Some(id),
        }
    }

    /// Whether a fetch is in flight
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

#[derive(Debug)]
struct Inner<D> {
    state: DetailState<D>,
    issued: Ticket,
}

/// Single-entity detail resource, cloneable handle
#[derive(Debug)]
pub struct DetailResource<D> {
    inner: Arc<Mutex<Inner<D>>>,
}

impl<D> Clone for DetailResource<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> Default for DetailResource<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DetailResource<D> {
    /// Closed overlay
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: DetailState::Idle,
                issued: 0,
            })),
        }
    }

    /// Select `id` and return the ticket its fetch must present
    pub fn select(&self, id: &str) -> Ticket {
        let mut inner = self.inner.lock();
        inner.issued += 1;
        let ticket = inner.issued;
        inner.state = DetailState::Loading {
            id: id.to_string(),
            ticket,
        };
        ticket
    }

    /// Apply a fetch result if `ticket` is still current
    ///
    /// Returns `false` when the result was discarded.
    pub fn resolve(&self, ticket: Ticket, result: Result<D>) -> bool {
        let mut inner = self.inner.lock();
        let id = match &inner.state {
            DetailState::Loading { id, ticket: current } if *current == ticket => id.clone(),
            _ => {
                debug!(ticket, "Discarding superseded detail response");
                return false;
            }
        };
        inner.state = match result {
            Ok(data) => DetailState::Loaded {
                id,
                data: Arc::new(data),
            },
            Err(error) => DetailState::Failed { id, error },
        };
        true
    }

    /// Close the overlay and release its data
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.issued += 1;
        inner.state = DetailState::Idle;
    }

    /// Loaded detail, if any
    pub fn data(&self) -> Option<Arc<D>> {
        match &self.inner.lock().state {
            DetailState::Loaded { data, .. } => Some(Arc::clone(data)),
            _ => None,
        }
    }
}

impl<D> DetailResource<D>
where
    D: Clone,
{
    /// Current state
    pub fn state(&self) -> DetailState<D> {
        self.inner.lock().state.clone()
    }

    /// Select `id`, fetch it, and return the state afterwards
    ///
    /// The fetch is issued only here, never ahead of a selection.
    pub async fn open<F, Fut>(&self, id: &str, fetcher: F) -> DetailState<D>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ServiceResult<D>>,
    {
        let ticket = self.select(id);
        let result = fetcher(id.to_string()).await.map_err(ConsoleError::from);
        self.resolve(ticket, result);
        self.state()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use console_service::ServiceError;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    #[test]
    fn test_select_then_resolve() {
        let overlay = DetailResource::new();
        let ticket = overlay.select("u_1");
        assert!(overlay.state().is_loading());

        assert!(overlay.resolve(ticket, Ok("profile".to_string())));
        assert_eq!(overlay.data().as_deref().map(String::as_str), Some("profile"));
        assert_eq!(overlay.state().selected_id(), Some("u_1"));
    }

    #[test]
    fn test_superseded_response_is_dropped() {
        let overlay = DetailResource::new();
        let first = overlay.select("u_1");
        let second = overlay.select("u_2");

        assert!(!overlay.resolve(first, Ok("first".to_string())));
        assert!(overlay.state().is_loading());
        assert!(overlay.resolve(second, Ok("second".to_string())));
        assert_eq!(
            overlay.state(),
            DetailState::Loaded {
                id: "u_2".into(),
                data: Arc::new("second".to_string()),
            }
        );
    }

    #[test]
    fn test_clear_ignores_late_result() {
        let overlay = DetailResource::<String>::new();
        let ticket = overlay.select("u_1");
        overlay.clear();

        assert!(!overlay.resolve(ticket, Ok("late".into())));
        assert_eq!(overlay.state(), DetailState::Idle);
        assert!(overlay.data().is_none());
    }

    #[tokio::test]
    async fn test_not_found_surfaces_as_failed_state() {
        let overlay = DetailResource::<String>::new();
        let state = overlay
            .open("u_404", |id| async move { Err(ServiceError::not_found(format!("user {id}"))) })
            .await;

        assert!(matches!(
            state,
            DetailState::Failed { ref id, error: ConsoleError::NotFound { .. } } if id == "u_404"
        ));
    }

    #[tokio::test]
    async fn test_slow_earlier_fetch_never_overwrites_later_selection() {
        let overlay = DetailResource::<String>::new();
        let (slow_tx, slow_rx) = oneshot::channel::<String>();

        let slow = {
            let overlay = overlay.clone();
            tokio::spawn(async move {
                overlay
                    .open("u_1", |_| async move { Ok(slow_rx.await.unwrap()) })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let fast = overlay
            .open("u_2", |id| async move { Ok(format!("detail {id}")) })
            .await;
        assert_eq!(fast.selected_id(), Some("u_2"));

        slow_tx.send("detail u_1".into()).unwrap();
        slow.await.unwrap();
        assert_eq!(overlay.data().as_deref().map(String::as_str), Some("detail u_2"));
    }
}
