//! Error taxonomy surfaced by the console engine

use console_service::ServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Errors surfaced to the operator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// Missing or invalid input; the operation was not attempted
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Field the input was entered in
        field: String,
        /// Error message
        message: String,
    },

    /// Credentials were rejected
    #[error("Login failed: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// Authenticated, but the role may not use the console
    #[error("Access denied: {message}")]
    Authorization {
        /// Error message
        message: String,
    },

    /// Detail fetch for a missing entity
    #[error("Not found: {resource}")]
    NotFound {
        /// Resource description
        resource: String,
    },

    /// Remote write failed and the optimistic change was rolled back
    #[error("Update of {entity_id} failed: {message}")]
    Mutation {
        /// Entity the write targeted
        entity_id: String,
        /// Error message
        message: String,
    },

    /// Remote call could not complete
    #[error("Network error: {message}")]
    TransientNetwork {
        /// Error message
        message: String,
    },

    /// Export could not be produced or written
    #[error("Export failed: {message}")]
    Export {
        /// Error message
        message: String,
    },

    /// Session state could not be read or written
    #[error("Session storage error at {}: {message}", path.display())]
    Storage {
        /// File involved
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },
}

impl ConsoleError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a mutation error
    pub fn mutation(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mutation {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }

    /// Create a transient network error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            message: message.into(),
        }
    }

    /// Create an export error
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short title used for toasts
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Invalid input",
            Self::Authentication { .. } => "Login failed",
            Self::Authorization { .. } => "Access denied",
            Self::NotFound { .. } => "Not found",
            Self::Mutation { .. } => "Update failed",
            Self::TransientNetwork { .. } => "Network error",
            Self::Export { .. } => "Export failed",
            Self::Storage { .. } => "Storage error",
            Self::Configuration { .. } => "Configuration error",
        }
    }
}

impl From<&ServiceError> for ConsoleError {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::NotFound { resource } => Self::not_found(resource.clone()),
            ServiceError::MissingCredentials
            | ServiceError::InvalidEmail
            | ServiceError::InvalidToken => Self::authentication(err.to_string()),
            ServiceError::Validation { message } => Self::validation("request", message.clone()),
            ServiceError::RemoteFailure { message } => Self::transient(message.clone()),
            ServiceError::Unavailable { .. } => Self::transient(err.to_string()),
        }
    }
}

impl From<ServiceError> for ConsoleError {
    fn from(err: ServiceError) -> Self {
        Self::from(&err)
    }
}

impl From<console_core::Error> for ConsoleError {
    fn from(err: console_core::Error) -> Self {
        match err {
            console_core::Error::Validation { field, message } => Self::Validation { field, message },
            console_core::Error::Configuration { message } => Self::Configuration { message },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::not_found("user u_9"), "Not found")]
    #[case(ServiceError::InvalidEmail, "Login failed")]
    #[case(ServiceError::MissingCredentials, "Login failed")]
    #[case(ServiceError::validation("bad"), "Invalid input")]
    #[case(ServiceError::remote_failure("timeout"), "Network error")]
    #[case(ServiceError::unavailable("admin"), "Network error")]
    fn test_service_error_classification(#[case] err: ServiceError, #[case] title: &str) {
        assert_eq!(ConsoleError::from(&err).title(), title);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ConsoleError::mutation("u_3", "write rejected").to_string(),
            "Update of u_3 failed: write rejected"
        );
        assert_eq!(
            ConsoleError::validation("min_amount", "must be a number").to_string(),
            "Invalid min_amount: must be a number"
        );
        assert!(
            ConsoleError::storage("/tmp/session.json", "denied")
                .to_string()
                .contains("/tmp/session.json")
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err = ConsoleError::from(console_core::Error::validation("role", "unknown"));
        assert!(matches!(err, ConsoleError::Validation { .. }));

        let err = ConsoleError::from(console_core::Error::Configuration {
            message: "page size 15 is not allowed".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: page size 15 is not allowed"
        );
    }
}
