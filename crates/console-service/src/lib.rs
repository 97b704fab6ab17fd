//! Remote collaborator contracts for the admin console
//!
//! This crate defines the async service traits the console engine consumes
//! (admin data, notification feed, identity) together with their request and
//! response types, and ships a deterministic seeded mock backend used by the
//! CLI and the test suites.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::trivially_copy_pass_by_ref,
    clippy::significant_drop_tightening
)]

pub mod error;
pub mod mock;
pub mod service;
pub mod types;

pub use error::{ServiceError, ServiceResult};
pub use service::{AdminService, AuthService, NotificationService};
pub use types::{
    AccountStatusFilter, Auxiliary, ListResponse, MutationAck, NotificationPage,
    NotificationQuery, PageWindow, SortDirection, SortSpec, TeacherListParams,
    TransactionListParams, UserListParams,
};

// Re-export commonly used items
pub use mock::{MockAdminService, MockAuthService, MockBackend, MockNotificationService};
