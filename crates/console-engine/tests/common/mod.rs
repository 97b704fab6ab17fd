//! Shared fixtures for the console engine integration tests

#![allow(dead_code)]

use chrono::Utc;
use console_core::Config;
use console_engine::{SessionManager, SessionStore, ViewContext};
use console_service::MockBackend;
use std::sync::Arc;
use tempfile::TempDir;

/// A console wired to a zero-latency mock backend with a private state
/// directory for the session file and exports
pub struct TestConsole {
    pub ctx: ViewContext,
    pub backend: MockBackend,
    pub dir: TempDir,
}

impl TestConsole {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.service.latency_ms = 0;
        config.export.output_dir = dir.path().join("exports");
        config.session.state_file = Some(dir.path().join("session.json"));

        let backend = MockBackend::from_config(&config.service, Utc::now());
        let ctx = ViewContext::from_backend(&backend, config);
        Self { ctx, backend, dir }
    }

    /// A fresh session manager over the shared session file
    pub fn session(&self) -> SessionManager {
        SessionManager::new(
            Arc::new(self.backend.auth.clone()),
            SessionStore::from_config(&self.ctx.config.session),
            self.ctx.bus.clone(),
        )
    }

    /// Titles of the toasts published so far
    pub fn toast_titles(&self) -> Vec<String> {
        self.ctx
            .bus
            .active()
            .into_iter()
            .map(|active| active.toast.title)
            .collect()
    }
}
