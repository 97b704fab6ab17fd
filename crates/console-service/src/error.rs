//! Error types for remote collaborator calls

use thiserror::Error;

/// Result type alias for collaborator calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors a remote collaborator can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Requested entity does not exist
    #[error("Not found: {resource}")]
    NotFound {
        /// Resource description, e.g. `user u_404`
        resource: String,
    },

    /// Email or password was empty
    #[error("Missing credentials")]
    MissingCredentials,

    /// Login address is not an email
    #[error("Invalid email")]
    InvalidEmail,

    /// SSO token unknown or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Request rejected because of bad input
    #[error("Validation failed: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Remote call reached the service and failed
    #[error("Remote call failed: {message}")]
    RemoteFailure {
        /// Error message
        message: String,
    },

    /// Service could not be reached
    #[error("Service unavailable: {service}")]
    Unavailable {
        /// Service name
        service: String,
    },
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a remote failure error
    pub fn remote_failure(message: impl Into<String>) -> Self {
        Self::RemoteFailure {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn unavailable(service: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
        }
    }

    /// Whether the failure came from credentials rather than the transport
    pub const fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials | Self::InvalidEmail | Self::InvalidToken
        )
    }

    /// Whether retrying later could succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
