//! Remote collaborator traits
//!
//! The console talks to three collaborators: the admin data service backing
//! every management table, the notification feed and the auth service. Each
//! is an async trait so the engine can run against the seeded mock or a real
//! backend without change.

use crate::error::ServiceResult;
use crate::types::{
    Ack, ActivityLogPage, ListResponse, MagicLinkReceipt, MutationAck, NotificationDraft,
    NotificationPage, NotificationQuery, TeacherListParams, TransactionListParams,
    UserListParams,
};
use async_trait::async_trait;
use console_core::types::{Analytics, RevenueSummary, StudentProfile, StudentSummary};
use console_core::{AuthUser, DateRange, NotificationItem, Teacher, Transaction, User};

/// Admin data service backing the management tables
#[async_trait]
pub trait AdminService: Send + Sync {
    /// List users; the auxiliary side table carries per-row student progress
    async fn list_users(&self, params: &UserListParams) -> ServiceResult<ListResponse<User>>;

    /// Activate or suspend an account
    ///
    /// Unknown ids are reported as `NotFound`.
    async fn set_user_active(&self, user_id: &str, is_active: bool) -> ServiceResult<MutationAck>;

    /// Student summary cards for a date range
    async fn student_summary(&self, range: &DateRange) -> ServiceResult<StudentSummary>;

    /// Expanded student record
    async fn student_profile(&self, user_id: &str) -> ServiceResult<StudentProfile>;

    /// Revenue cards for a date range
    async fn revenue_overview(&self, range: &DateRange) -> ServiceResult<RevenueSummary>;

    /// List payment transactions
    async fn list_transactions(
        &self,
        params: &TransactionListParams,
    ) -> ServiceResult<ListResponse<Transaction>>;

    /// List teachers
    async fn list_teachers(
        &self,
        params: &TeacherListParams,
    ) -> ServiceResult<ListResponse<Teacher>>;

    /// Activity log of one teacher
    async fn teacher_activity_logs(&self, teacher_id: &str) -> ServiceResult<ActivityLogPage>;

    /// Growth, topic popularity and revenue datasets
    async fn analytics(&self, range: &DateRange) -> ServiceResult<Analytics>;
}

/// Cursor-paginated operator notification feed
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// One page of notifications, newest first
    async fn list(&self, query: &NotificationQuery) -> ServiceResult<NotificationPage>;

    /// Mark one notification read
    async fn mark_read(&self, id: &str) -> ServiceResult<Ack>;

    /// Mark every notification read
    async fn mark_all_read(&self) -> ServiceResult<Ack>;

    /// Simulate a notification arriving in the background
    async fn push(&self, draft: NotificationDraft) -> ServiceResult<NotificationItem>;
}

/// Identity provider
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Email and password login
    async fn login_with_email(&self, email: &str, password: &str) -> ServiceResult<AuthUser>;

    /// Resolve an SSO token
    async fn verify_token(&self, token: &str) -> ServiceResult<AuthUser>;

    /// Send a passwordless login link
    async fn send_magic_link(&self, email: &str) -> ServiceResult<MagicLinkReceipt>;
}
