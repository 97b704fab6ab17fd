//! Operator session and console access guard
//!
//! Only `super_admin` identities may use the console. The authenticated
//! identity is kept in a small JSON file so it survives between runs; the
//! file is a convenience, not a security boundary.

use crate::error::{ConsoleError, Result};
use crate::toast::{NotificationBus, Toast};
use chrono::{DateTime, Utc};
use console_core::config::SessionConfig;
use console_core::{AuthUser, Role};
use console_service::AuthService;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const SESSION_FILE: &str = "session.json";
const ACCESS_DENIED: &str = "Only super_admin may access this console";

/// On-disk session record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    /// Authenticated identity
    pub user: AuthUser,
    /// When the login happened
    pub saved_at: DateTime<Utc>,
}

/// JSON file holding the current identity
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or under the home directory
    pub fn from_config(config: &SessionConfig) -> Self {
        config
            .state_file
            .clone()
            .map_or_else(|| Self::new(Self::default_path()), Self::new)
    }

    /// `~/.admin-console/session.json`, or the working directory when no
    /// home directory is known
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.home_dir().to_path_buf())
            .join(".admin-console")
            .join(SESSION_FILE)
    }

    /// File location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session
    ///
    /// A missing file is no session. An unreadable record is logged and
    /// treated as no session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<StoredSession>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConsoleError::storage(&self.path, e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    /// Persist `user`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be written.
    pub fn save(&self, user: &AuthUser) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConsoleError::storage(parent, e.to_string()))?;
        }
        let record = StoredSession {
            user: user.clone(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| ConsoleError::storage(&self.path, e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ConsoleError::storage(&self.path, e.to_string()))
    }

    /// Remove the stored session; a missing file is not an error
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConsoleError::storage(&self.path, e.to_string())),
        }
    }
}

/// Login, logout and the super-admin guard
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    store: SessionStore,
    bus: NotificationBus,
    current: RwLock<Option<AuthUser>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Manager with no active session
    pub fn new(auth: Arc<dyn AuthService>, store: SessionStore, bus: NotificationBus) -> Self {
        Self {
            auth,
            store,
            bus,
            current: RwLock::new(None),
        }
    }

    /// Identity of the active session
    pub fn current(&self) -> Option<AuthUser> {
        self.current.read().clone()
    }

    /// Session file backing this manager
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load the persisted identity into the active session
    ///
    /// # Errors
    ///
    /// Returns a storage error if the session file cannot be read.
    pub fn restore(&self) -> Result<Option<AuthUser>> {
        let user = self.store.load()?.map(|session| session.user);
        (*self.current.write()).clone_from(&user);
        Ok(user)
    }

    /// Log in with email and password
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank email or password; nothing is called
    /// - `Authentication` when the identity provider rejects the login
    /// - `Authorization` when the identity is not a super admin
    pub async fn login_with_email(&self, email: &str, password: &str) -> Result<AuthUser> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ConsoleError::validation(
                "credentials",
                "email and password are required",
            ));
        }

        let outcome = self
            .auth
            .login_with_email(email.trim(), password)
            .await
            .map_err(|e| ConsoleError::authentication(e.to_string()))
            .and_then(|user| self.establish(user));

        match outcome {
            Ok(user) => {
                self.bus.publish(Toast::new("Logged in"));
                Ok(user)
            }
            Err(err) => {
                self.bus
                    .publish(Toast::new("Login failed").with_description(failure_reason(&err)));
                Err(err)
            }
        }
    }

    /// Log in with an SSO token
    ///
    /// # Errors
    ///
    /// Same classification as [`Self::login_with_email`].
    pub async fn login_with_token(&self, token: &str) -> Result<AuthUser> {
        if token.trim().is_empty() {
            return Err(ConsoleError::validation("token", "token is required"));
        }

        let outcome = self
            .auth
            .verify_token(token.trim())
            .await
            .map_err(|e| ConsoleError::authentication(e.to_string()))
            .and_then(|user| self.establish(user));

        match outcome {
            Ok(user) => {
                self.bus
                    .publish(Toast::new("SSO success").with_description("Signed in via main website"));
                Ok(user)
            }
            Err(err) => {
                self.bus
                    .publish(Toast::new("SSO failed").with_description(failure_reason(&err)));
                Err(err)
            }
        }
    }

    /// Request a passwordless login link
    ///
    /// # Errors
    ///
    /// `Validation` for a blank email, `Authentication` if the provider
    /// refuses.
    pub async fn send_magic_link(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(ConsoleError::validation("email", "email is required"));
        }
        self.auth
            .send_magic_link(email.trim())
            .await
            .map_err(|e| ConsoleError::authentication(e.to_string()))?;
        info!(email = email.trim(), "Magic link sent");
        self.bus
            .publish(Toast::new("Magic link sent").with_description(format!("Check {}", email.trim())));
        Ok(())
    }

    /// End the session and forget the stored identity
    ///
    /// # Errors
    ///
    /// Returns a storage error if the session file cannot be removed.
    pub fn logout(&self) -> Result<()> {
        let previous = self.current.write().take();
        if let Some(user) = previous {
            info!(user = %user.id, "Logged out");
        }
        self.store.clear()
    }

    /// The active identity, if it may use the console
    ///
    /// # Errors
    ///
    /// Returns `Authorization` and shows a toast when there is no session
    /// or the identity is not a super admin.
    pub fn require_super_admin(&self) -> Result<AuthUser> {
        match self.current() {
            Some(user) if user.role == Role::SuperAdmin => Ok(user),
            _ => {
                self.bus.publish(
                    Toast::new("Insufficient permissions")
                        .with_description("Only Super Admins can access this page."),
                );
                Err(ConsoleError::authorization(ACCESS_DENIED))
            }
        }
    }

    fn establish(&self, user: AuthUser) -> Result<AuthUser> {
        if user.role != Role::SuperAdmin {
            warn!(user = %user.id, role = %user.role, "Rejected console login");
            return Err(ConsoleError::authorization(ACCESS_DENIED));
        }
        self.store.save(&user)?;
        *self.current.write() = Some(user.clone());
        info!(user = %user.id, "Logged in");
        Ok(user)
    }
}

fn failure_reason(err: &ConsoleError) -> String {
    match err {
        ConsoleError::Authentication { message } | ConsoleError::Authorization { message } => {
            message.clone()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use console_service::mock::{DEMO_SSO_TOKEN, MockAuthService, SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn manager(auth: MockAuthService) -> (SessionManager, NotificationBus, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let bus = NotificationBus::default();
        let store = SessionStore::new(dir.path().join("state").join("session.json"));
        (SessionManager::new(Arc::new(auth), store, bus.clone()), bus, dir)
    }

    fn titles(bus: &NotificationBus) -> Vec<String> {
        bus.active().into_iter().map(|t| t.toast.title).collect()
    }

    #[tokio::test]
    async fn test_empty_credentials_are_rejected_locally() {
        let auth = MockAuthService::new();
        let (session, bus, _dir) = manager(auth.clone());

        let err = session.login_with_email("", "secret").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation { .. }));
        let err = session.login_with_email("a@b.com", "").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation { .. }));

        assert_eq!(auth.call_count("login_with_email"), 0);
        assert!(bus.active().is_empty());
    }

    #[tokio::test]
    async fn test_operator_login_persists_identity() {
        let (session, bus, _dir) = manager(MockAuthService::new());

        let user = session
            .login_with_email(SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.role, Role::SuperAdmin);
        assert_eq!(titles(&bus), vec!["Logged in"]);
        assert_eq!(session.store().load().unwrap().unwrap().user, user);
        assert_eq!(session.require_super_admin().unwrap(), user);
    }

    #[tokio::test]
    async fn test_admin_role_is_not_allowed_in() {
        let (session, bus, _dir) = manager(MockAuthService::new());

        let err = session
            .login_with_email("random@x.com", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Authorization { .. }));
        assert!(session.current().is_none());
        assert!(session.store().load().unwrap().is_none());
        assert_eq!(titles(&bus), vec!["Login failed"]);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let (session, bus, _dir) = manager(MockAuthService::new());

        let err = session.login_with_email("not-an-email", "pw").await.unwrap_err();
        assert_eq!(err, ConsoleError::authentication("Invalid email"));
        assert_eq!(bus.active()[0].toast.description.as_deref(), Some("Invalid email"));
    }

    #[tokio::test]
    async fn test_token_login_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let bus = NotificationBus::default();

        let first = SessionManager::new(
            Arc::new(MockAuthService::new()),
            SessionStore::new(&path),
            bus.clone(),
        );
        first.login_with_token(DEMO_SSO_TOKEN).await.unwrap();
        assert_eq!(titles(&bus), vec!["SSO success"]);

        let second = SessionManager::new(
            Arc::new(MockAuthService::new()),
            SessionStore::new(&path),
            bus.clone(),
        );
        assert!(second.current().is_none());
        let restored = second.restore().unwrap().unwrap();
        assert_eq!(restored.id, "sa_1");
        assert!(second.require_super_admin().is_ok());

        second.logout().unwrap();
        assert!(second.current().is_none());
        assert!(!path.exists());
        assert!(second.logout().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (session, bus, _dir) = manager(MockAuthService::new());
        let err = session.login_with_token("bogus").await.unwrap_err();

        assert_eq!(err, ConsoleError::authentication("Invalid or expired token"));
        assert_eq!(titles(&bus), vec!["SSO failed"]);
    }

    #[test]
    fn test_guard_without_session() {
        let (session, bus, _dir) = manager(MockAuthService::new());
        let err = session.require_super_admin().unwrap_err();

        assert!(matches!(err, ConsoleError::Authorization { .. }));
        assert_eq!(titles(&bus), vec!["Insufficient permissions"]);
    }

    #[test]
    fn test_corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(SessionStore::new(&path).load().unwrap().is_none());
    }
}
