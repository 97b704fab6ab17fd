//! Configuration management for the admin console

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

/// Page sizes a management table may use
pub const ALLOWED_PAGE_SIZES: [u32; 3] = [10, 20, 50];

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ADMIN_CONSOLE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Table and toast behaviour
    #[serde(default)]
    #[validate(nested)]
    pub console: ConsoleConfig,

    /// Simulated backend configuration
    #[serde(default)]
    #[validate(nested)]
    pub service: ServiceConfig,

    /// Notification feed configuration
    #[serde(default)]
    #[validate(nested)]
    pub notifications: NotificationConfig,

    /// Export pipeline configuration
    #[serde(default)]
    #[validate(nested)]
    pub export: ExportConfig,

    /// Session persistence configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Table and toast behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsoleConfig {
    /// Page size used when a view is first opened
    #[serde(default = "default_page_size")]
    #[validate(custom(function = "validate_page_size"))]
    pub default_page_size: u32,

    /// How long a toast stays visible, in milliseconds
    #[serde(default = "default_toast_duration_ms")]
    #[validate(range(min = 100, max = 60_000))]
    pub toast_duration_ms: u64,
}

/// Simulated backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Artificial latency applied to every remote call, in milliseconds
    #[serde(default = "default_latency_ms")]
    #[validate(range(max = 10_000))]
    pub latency_ms: u64,

    /// Seed for the deterministic dataset generator
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Notification feed configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationConfig {
    /// Periodic refresh interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub poll_interval_secs: u64,

    /// Items fetched per cursor page
    #[serde(default = "default_notification_limit")]
    #[validate(range(min = 1, max = 100))]
    pub page_limit: usize,

    /// Refresh when the console regains focus
    #[serde(default = "default_refresh_on_focus")]
    pub refresh_on_focus: bool,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExportConfig {
    /// Directory export artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Body font size for PDF tables, in points
    #[serde(default = "default_pdf_font_size")]
    #[validate(range(min = 6, max = 16))]
    pub pdf_font_size: u32,

    /// Table rows per PDF page
    #[serde(default = "default_pdf_rows_per_page")]
    #[validate(range(min = 5, max = 60))]
    pub pdf_rows_per_page: usize,
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File the authenticated identity is stored in. Falls back to the
    /// platform data directory when unset.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
const fn default_page_size() -> u32 {
    10
}

const fn default_toast_duration_ms() -> u64 {
    3000
}

const fn default_latency_ms() -> u64 {
    400
}

const fn default_seed() -> u64 {
    42
}

const fn default_poll_interval_secs() -> u64 {
    20
}

const fn default_notification_limit() -> usize {
    10
}

const fn default_refresh_on_focus() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

const fn default_pdf_font_size() -> u32 {
    9
}

const fn default_pdf_rows_per_page() -> usize {
    28
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn validate_page_size(size: u32) -> std::result::Result<(), ValidationError> {
    if ALLOWED_PAGE_SIZES.contains(&size) {
        Ok(())
    } else {
        Err(ValidationError::new("page_size_not_allowed"))
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            toast_duration_ms: default_toast_duration_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            seed: default_seed(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            page_limit: default_notification_limit(),
            refresh_on_focus: default_refresh_on_focus(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pdf_font_size: default_pdf_font_size(),
            pdf_rows_per_page: default_pdf_rows_per_page(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from `admin-console.toml` (if present) and environment
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file, then environment overrides
    ///
    /// Environment variables use the `ADMIN_CONSOLE` prefix and `__` as the
    /// section separator, e.g. `ADMIN_CONSOLE_SERVICE__LATENCY_MS=0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed or fails validation.
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("admin-console").required(false),
        };

        let config = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}
