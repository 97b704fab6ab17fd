//! Seeded in-memory mock backend
//!
//! Every mock shares the same conventions: a configurable artificial latency,
//! per-operation call counters for asserting request coalescing, and builder
//! style `with_*` configuration.

pub mod admin;
pub mod auth;
pub mod dataset;
pub mod notifications;

pub use admin::MockAdminService;
pub use auth::{DEMO_SSO_TOKEN, MockAuthService, SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD};
pub use dataset::{Dataset, Lcg};
pub use notifications::MockNotificationService;

use chrono::{DateTime, Utc};
use console_core::config::ServiceConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

/// Shared per-operation call counters
#[derive(Debug, Clone, Default)]
pub struct CallCounters {
    counts: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl CallCounters {
    /// Record one call of `operation`
    pub fn record(&self, operation: &'static str) {
        *self.counts.lock().entry(operation).or_default() += 1;
    }

    /// Calls recorded for `operation`
    pub fn get(&self, operation: &str) -> usize {
        self.counts.lock().get(operation).copied().unwrap_or_default()
    }
}

pub(crate) async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        sleep(Duration::from_millis(latency_ms)).await;
    }
}

/// The three mock collaborators built from one configuration
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Admin data service
    pub admin: MockAdminService,
    /// Notification feed
    pub notifications: MockNotificationService,
    /// Identity provider
    pub auth: MockAuthService,
}

impl MockBackend {
    /// Build every mock from the service configuration
    ///
    /// The notification feed and auth service answer at half the admin
    /// latency.
    pub fn from_config(config: &ServiceConfig, now: DateTime<Utc>) -> Self {
        Self {
            admin: MockAdminService::new(config.seed, now).with_latency(config.latency_ms),
            notifications: MockNotificationService::seeded(config.seed, now)
                .with_latency(config.latency_ms / 2),
            auth: MockAuthService::new().with_latency(config.latency_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_counters_are_shared_between_clones() {
        let counters = CallCounters::default();
        let clone = counters.clone();

        counters.record("list_users");
        clone.record("list_users");

        assert_eq!(counters.get("list_users"), 2);
        assert_eq!(counters.get("analytics"), 0);
    }

    #[test]
    fn test_backend_from_config() {
        let config = ServiceConfig {
            latency_ms: 0,
            seed: 42,
        };
        let backend = MockBackend::from_config(&config, Utc::now());

        assert_eq!(backend.admin.snapshot().users.len(), 90);
        assert_eq!(backend.notifications.all().len(), 18);
    }
}
