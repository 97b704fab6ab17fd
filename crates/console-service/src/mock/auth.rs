//! Mock identity provider with fixed demo credentials

use super::{CallCounters, simulate_latency};
use crate::error::{ServiceError, ServiceResult};
use crate::service::AuthService;
use crate::types::MagicLinkReceipt;
use async_trait::async_trait;
use console_core::{AuthUser, Role};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Email of the built-in console operator
pub const SUPER_ADMIN_EMAIL: &str = "dknishwanth1718@gmail.com";

/// Password of the built-in console operator
pub const SUPER_ADMIN_PASSWORD: &str = "Nishwanth";

/// SSO token that always resolves to a super admin
pub const DEMO_SSO_TOKEN: &str = "demo-sso-token-123";

/// Mock auth service
///
/// The fixed operator credentials log in as `super_admin`; any other address
/// containing `@` logs in as `admin`. Tokens resolve through an in-memory
/// table seeded with [`DEMO_SSO_TOKEN`].
#[derive(Debug, Clone)]
pub struct MockAuthService {
    tokens: Arc<RwLock<HashMap<String, AuthUser>>>,
    latency_ms: u64,
    calls: CallCounters,
}

impl MockAuthService {
    /// Create a service with the demo token registered
    pub fn new() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            DEMO_SSO_TOKEN.to_string(),
            AuthUser {
                id: "sa_1".to_string(),
                name: "Super Admin".to_string(),
                email: String::new(),
                role: Role::SuperAdmin,
            },
        );

        Self {
            tokens: Arc::new(RwLock::new(tokens)),
            latency_ms: 0,
            calls: CallCounters::default(),
        }
    }

    /// Set simulated latency for every call
    pub const fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Register an additional token
    pub fn with_token(self, token: impl Into<String>, user: AuthUser) -> Self {
        self.tokens.write().insert(token.into(), user);
        self
    }

    /// Number of calls made to `operation` so far
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.get(operation)
    }

    async fn enter(&self, operation: &'static str) {
        self.calls.record(operation);
        debug!(operation, "Mock auth call");
        simulate_latency(self.latency_ms).await;
    }
}

impl Default for MockAuthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn login_with_email(&self, email: &str, password: &str) -> ServiceResult<AuthUser> {
        self.enter("login_with_email").await;

        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::MissingCredentials);
        }
        if email == SUPER_ADMIN_EMAIL && password == SUPER_ADMIN_PASSWORD {
            return Ok(AuthUser {
                id: "auth_superadmin".to_string(),
                name: "Nishwanth".to_string(),
                email: email.to_string(),
                role: Role::SuperAdmin,
            });
        }

        let Some((local, _)) = email.split_once('@') else {
            return Err(ServiceError::InvalidEmail);
        };
        Ok(AuthUser {
            id: format!("auth_{email}"),
            name: local.to_string(),
            email: email.to_string(),
            role: Role::Admin,
        })
    }

    async fn verify_token(&self, token: &str) -> ServiceResult<AuthUser> {
        self.enter("verify_token").await;
        let user = self.tokens.read().get(token).cloned();
        user.ok_or(ServiceError::InvalidToken)
    }

    async fn send_magic_link(&self, email: &str) -> ServiceResult<MagicLinkReceipt> {
        self.enter("send_magic_link").await;
        if email.trim().is_empty() {
            return Err(ServiceError::validation("Email required"));
        }
        Ok(MagicLinkReceipt { sent: true })
    }
}
