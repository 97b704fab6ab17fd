//! Core data types for the admin console

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable entity identifier (e.g. `u_12`, `tx_7`)
pub type EntityId = String;

/// Anything a management table lists and the cache can index by id
pub trait Entity: Clone + Send + Sync + 'static {
    /// The entity's stable identifier
    fn entity_id(&self) -> &str;
}

/// Account role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Learner
    Student,
    /// Instructor
    Teacher,
    /// Platform administrator
    Admin,
    /// Console operator
    SuperAdmin,
}

impl Role {
    /// Wire/display identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(crate::Error::validation("role", format!("unknown role '{other}'"))),
        }
    }
}

/// Platform user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Stable identifier
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Account role
    pub role: Role,
    /// Most recent login
    pub last_login_at: DateTime<Utc>,
    /// Account creation time
    pub created_at: DateTime<Utc>,
    /// `false` when the account is suspended
    pub is_active: bool,
    /// Optional avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Entity for User {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Teacher summary row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Teacher {
    /// Stable identifier (shared with the teacher's user account)
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Number of students assigned to this teacher
    pub assigned_students_count: u32,
    /// Most recent recorded activity
    pub last_activity_at: DateTime<Utc>,
}

impl Entity for Teacher {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Payment outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment captured
    Success,
    /// Payment declined or errored
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Payment transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Stable identifier
    pub id: EntityId,
    /// Paying user
    pub user_id: EntityId,
    /// Payer name at the time of payment
    pub name: String,
    /// Payer email at the time of payment
    pub email: String,
    /// Outcome
    pub status: PaymentStatus,
    /// Amount in whole rupees
    pub amount_inr: u64,
    /// When the payment was attempted
    pub date: DateTime<Utc>,
}

impl Entity for Transaction {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Subscription plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// No paid plan
    Free,
    /// Billed monthly
    PremiumMonthly,
    /// Billed yearly
    PremiumYearly,
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Currently billed
    Active,
    /// Ended by the user or expired
    Canceled,
    /// Payment overdue
    PastDue,
}

/// A student's subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    /// Stable identifier
    pub id: EntityId,
    /// Subscribed user
    pub user_id: EntityId,
    /// Plan
    pub plan: Plan,
    /// Status
    pub status: SubscriptionStatus,
    /// Start of the subscription
    pub start_date: DateTime<Utc>,
    /// End of the subscription, absent while active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Curriculum topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Arrays
    Arrays,
    /// Strings
    Strings,
    /// Trees
    Trees,
    /// Graphs
    Graphs,
    /// Dynamic programming
    #[serde(rename = "DP")]
    Dp,
    /// Searching
    Searching,
    /// Sorting
    Sorting,
}

impl Topic {
    /// All topics in curriculum order
    pub const ALL: [Self; 7] = [
        Self::Arrays,
        Self::Strings,
        Self::Trees,
        Self::Graphs,
        Self::Dp,
        Self::Searching,
        Self::Sorting,
    ];

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Arrays => "Arrays",
            Self::Strings => "Strings",
            Self::Trees => "Trees",
            Self::Graphs => "Graphs",
            Self::Dp => "DP",
            Self::Searching => "Searching",
            Self::Sorting => "Sorting",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Topic {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::validation("topic", format!("unknown topic '{s}'")))
    }
}

/// A completed mock test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedTest {
    /// Stable identifier
    pub id: String,
    /// Test title
    pub title: String,
    /// Score, 0..=100
    pub score_pct: u8,
    /// When the test was taken
    pub date: DateTime<Utc>,
}

/// Certification progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CertificationStatus {
    /// Not started
    #[serde(rename = "Not Started")]
    NotStarted,
    /// Underway
    #[serde(rename = "In Progress")]
    InProgress,
    /// Certificate issued
    Certified,
}

impl fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Not Started"),
            Self::InProgress => write!(f, "In Progress"),
            Self::Certified => write!(f, "Certified"),
        }
    }
}

/// Certification record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Certification {
    /// Status
    pub status: CertificationStatus,
    /// Issue date, only for certified students
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_on: Option<DateTime<Utc>>,
}

/// Per-student learning progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentProgress {
    /// Student the record belongs to
    pub user_id: EntityId,
    /// Mean of the topic percentages, rounded
    pub progress_pct: u8,
    /// Completion per topic, in curriculum order
    pub topics: IndexMap<Topic, u8>,
    /// Tests taken
    pub completed_tests: Vec<CompletedTest>,
    /// Certification state
    pub certification: Certification,
}

/// Expanded student record shown in the profile overlay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentProfile {
    /// The student's account
    pub user: User,
    /// Progress record
    pub progress: StudentProgress,
    /// Subscription, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

/// One teacher activity log line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLog {
    /// Stable identifier
    pub id: String,
    /// What happened
    pub text: String,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Summary cards for the student progress view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentSummary {
    /// Students enrolled
    pub total_students: u64,
    /// Mean completion percentage
    pub average_completion: u8,
    /// Students who logged in on the last day of the range
    pub active_today: u64,
}

/// Revenue cards for the payments view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevenueSummary {
    /// Successful payments in the 30 days ending at the range end
    pub monthly_revenue_inr: u64,
    /// All successful payments
    pub lifetime_revenue_inr: u64,
    /// Active subscriptions
    pub active_subscriptions: u64,
    /// Failed payments in range
    pub failed_payments: u64,
}

/// Student count on a given day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrowthPoint {
    /// Day
    pub date: DateTime<Utc>,
    /// Cumulative student count
    pub students_total: u64,
}

/// Topic engagement count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicPopularity {
    /// Topic
    pub topic: Topic,
    /// Engagements
    pub count: u64,
}

/// Revenue on a given day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevenuePoint {
    /// Day
    pub date: DateTime<Utc>,
    /// Revenue in rupees
    pub revenue_inr: u64,
}

/// Analytics datasets for a date range
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Analytics {
    /// Student growth series
    pub growth: Vec<GrowthPoint>,
    /// Topic popularity
    pub topic_popularity: Vec<TopicPopularity>,
    /// Revenue series
    pub revenue_trend: Vec<RevenuePoint>,
}

/// Notification category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Platform events
    System,
    /// Billing events
    Payment,
    /// Account events
    Account,
    /// Generated reports
    Report,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Payment => write!(f, "payment"),
            Self::Account => write!(f, "account"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Info,
    /// Needs attention
    Warning,
    /// Something failed
    Error,
    /// Something succeeded
    Success,
}

/// Operator notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationItem {
    /// Stable identifier, also used as the pagination cursor
    pub id: EntityId,
    /// Headline
    pub title: String,
    /// Optional detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Whether the operator has seen it
    pub read: bool,
    /// Category
    pub kind: NotificationType,
    /// Severity
    pub severity: Severity,
    /// Optional in-console link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Entity for NotificationItem {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    /// Stable identifier
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Login address
    pub email: String,
    /// Role granted by the auth service
    pub role: Role,
}

/// Inclusive time window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// Start, inclusive
    pub from: DateTime<Utc>,
    /// End, inclusive
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Range ending at `to` and starting `days` earlier
    #[must_use]
    pub fn last_days(to: DateTime<Utc>, days: i64) -> Self {
        Self {
            from: to - Duration::days(days),
            to,
        }
    }

    /// Whether `instant` falls inside the range
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant <= self.to
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::last_days(Utc::now(), 30)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Role::Student, "student")]
    #[case(Role::Teacher, "teacher")]
    #[case(Role::Admin, "admin")]
    #[case(Role::SuperAdmin, "super_admin")]
    fn test_role_round_trips_through_str(#[case] role: Role, #[case] wire: &str) {
        assert_eq!(role.to_string(), wire);
        assert_eq!(wire.parse::<Role>().unwrap(), role);
        assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{wire}\""));
    }

    #[test]
    fn test_unknown_role_is_validation_error() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert!(matches!(err, crate::Error::Validation { .. }));
    }

    #[test]
    fn test_topic_labels_and_parsing() {
        assert_eq!(Topic::Dp.to_string(), "DP");
        assert_eq!("dp".parse::<Topic>().unwrap(), Topic::Dp);
        assert_eq!("Graphs".parse::<Topic>().unwrap(), Topic::Graphs);
        assert!("Calculus".parse::<Topic>().is_err());
        assert_eq!(serde_json::to_string(&Topic::Dp).unwrap(), "\"DP\"");
    }

    #[test]
    fn test_certification_status_serializes_with_spaces() {
        let json = serde_json::to_string(&CertificationStatus::NotStarted).unwrap();
        assert_eq!(json, "\"Not Started\"");
    }

    #[test]
    fn test_date_range_contains_is_inclusive() {
        let to = Utc::now();
        let range = DateRange::last_days(to, 30);

        assert!(range.contains(to));
        assert!(range.contains(range.from));
        assert!(!range.contains(to + Duration::seconds(1)));
        assert!(!range.contains(range.from - Duration::seconds(1)));
    }
}
