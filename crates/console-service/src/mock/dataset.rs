//! Deterministic seeded dataset for the mock backend

use chrono::{DateTime, Duration, Utc};
use console_core::types::{
    Certification, CertificationStatus, CompletedTest, NotificationType, PaymentStatus, Plan,
    Severity, StudentProgress, Subscription, SubscriptionStatus, Topic,
};
use console_core::{EntityId, NotificationItem, Role, Teacher, Transaction, User};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Number of generated users
pub const USER_COUNT: u32 = 90;

/// Number of generated transactions
pub const TRANSACTION_COUNT: u32 = 140;

/// Number of seeded notifications
pub const NOTIFICATION_COUNT: u32 = 18;

const MODULUS: u64 = 1 << 32;

const FIRST_NAMES: [&str; 20] = [
    "Aarav", "Vivaan", "Aditya", "Vihaan", "Arjun", "Sai", "Krishna", "Ishaan", "Rohan", "Dhruv",
    "Ananya", "Aditi", "Diya", "Isha", "Kavya", "Myra", "Sara", "Meera", "Anika", "Navya",
];

const LAST_NAMES: [&str; 10] = [
    "Sharma", "Verma", "Gupta", "Mehta", "Patel", "Reddy", "Iyer", "Nair", "Khan", "Singh",
];

const PLANS: [Plan; 3] = [Plan::Free, Plan::PremiumMonthly, Plan::PremiumYearly];

const PAID_STATUSES: [SubscriptionStatus; 3] = [
    SubscriptionStatus::Active,
    SubscriptionStatus::PastDue,
    SubscriptionStatus::Canceled,
];

const CERTIFICATIONS: [CertificationStatus; 3] = [
    CertificationStatus::NotStarted,
    CertificationStatus::InProgress,
    CertificationStatus::Certified,
];

const AMOUNTS: [u64; 5] = [499, 999, 1999, 2999, 4999];

const NOTIFICATION_TITLES: [&str; 6] = [
    "New subscription activated",
    "Payment failed",
    "Teacher assigned a student",
    "Account password reset",
    "User re-activated",
    "Monthly revenue report ready",
];

const NOTIFICATION_KINDS: [NotificationType; 6] = [
    NotificationType::Payment,
    NotificationType::Payment,
    NotificationType::Account,
    NotificationType::Account,
    NotificationType::System,
    NotificationType::Report,
];

const NOTIFICATION_SEVERITIES: [Severity; 6] = [
    Severity::Success,
    Severity::Error,
    Severity::Info,
    Severity::Warning,
    Severity::Success,
    Severity::Info,
];

/// Linear congruential generator producing values in `[0, 1)`
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a generator from a seed
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed % MODULUS,
        }
    }

    /// Next value in `[0, 1)`
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * 1_664_525 + 1_013_904_223) % MODULUS;
        self.state as f64 / MODULUS as f64
    }

    /// Uniform element of a non-empty slice
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        let index = (self.next_f64() * items.len() as f64).floor() as usize;
        items[index.min(items.len() - 1)]
    }

    /// Uniform integer in `[min, max]`
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss
    )]
    pub fn randint(&mut self, min: i64, max: i64) -> i64 {
        (self.next_f64() * (max - min + 1) as f64).floor() as i64 + min
    }
}

/// In-memory source of truth for the mock backend
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Reference instant all relative dates are computed from
    pub now: DateTime<Utc>,
    /// Users in id order
    pub users: Vec<User>,
    /// Teachers in id order
    pub teachers: Vec<Teacher>,
    /// One subscription per student
    pub subscriptions: Vec<Subscription>,
    /// Progress records by student id
    pub progress: HashMap<EntityId, StudentProgress>,
    /// Transactions in id order
    pub transactions: Vec<Transaction>,
    /// Notifications, newest first
    pub notifications: Vec<NotificationItem>,
    rng: Lcg,
}

impl Dataset {
    /// Generate the dataset for `seed`, with dates relative to `now`
    pub fn generate(seed: u64, now: DateTime<Utc>) -> Self {
        let mut rng = Lcg::new(seed);
        let days_ago = |days: i64| now - Duration::days(days);

        let mut users = Vec::new();
        let mut teachers = Vec::new();
        let mut subscriptions = Vec::new();
        let mut progress = HashMap::new();
        let mut student_ids = Vec::new();

        for i in 1..=USER_COUNT {
            let role = if i % 15 == 0 {
                Role::Teacher
            } else {
                Role::Student
            };
            let first = rng.pick(&FIRST_NAMES);
            let last = rng.pick(&LAST_NAMES);
            let name = format!("{first} {last} {i}");
            let email = format!("{}@example.com", name.to_lowercase().replace(' ', "_"));
            let last_login_at = days_ago(rng.randint(0, 15));
            let created_at = days_ago(rng.randint(30, 365));
            let is_active = rng.next_f64() > 0.1;

            let user = User {
                id: format!("u_{i}"),
                name,
                email,
                role,
                last_login_at,
                created_at,
                is_active,
                avatar_url: None,
            };

            if role == Role::Teacher {
                let assigned = rng.randint(5, 40);
                teachers.push(Teacher {
                    id: user.id.clone(),
                    name: user.name.clone(),
                    email: user.email.clone(),
                    assigned_students_count: u32::try_from(assigned).unwrap_or_default(),
                    last_activity_at: days_ago(rng.randint(0, 10)),
                });
            } else {
                student_ids.push(user.id.clone());
                subscriptions.push(generate_subscription(&mut rng, i, &user.id, now));
                progress.insert(
                    user.id.clone(),
                    generate_progress(&mut rng, i, &user.id, now),
                );
            }

            users.push(user);
        }

        let student_refs: Vec<&str> = student_ids.iter().map(String::as_str).collect();
        let mut transactions = Vec::new();
        for i in 1..=TRANSACTION_COUNT {
            let user_id = rng.pick(&student_refs);
            let Some(user) = users.iter().find(|u| u.id == user_id) else {
                continue;
            };
            let status = if rng.next_f64() > 0.2 {
                PaymentStatus::Success
            } else {
                PaymentStatus::Failed
            };
            let amount_inr = rng.pick(&AMOUNTS);
            transactions.push(Transaction {
                id: format!("tx_{i}"),
                user_id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                status,
                amount_inr,
                date: days_ago(rng.randint(0, 120)),
            });
        }

        let notifications = (0..NOTIFICATION_COUNT)
            .map(|i| {
                let slot = (i % 6) as usize;
                NotificationItem {
                    id: format!("n_{i}"),
                    title: NOTIFICATION_TITLES[slot].to_string(),
                    body: Some(format!("Mock notification #{i}")),
                    created_at: now - Duration::minutes(i64::from(i) * 9),
                    read: i > 5,
                    kind: NOTIFICATION_KINDS[slot],
                    severity: NOTIFICATION_SEVERITIES[slot],
                    link: (slot == 5).then(|| "/super-admin?tab=analytics".to_string()),
                }
            })
            .collect();

        Self {
            now,
            users,
            teachers,
            subscriptions,
            progress,
            transactions,
            notifications,
            rng,
        }
    }

    /// Shared generator, advanced by on-demand datasets such as activity logs
    pub fn rng(&mut self) -> &mut Lcg {
        &mut self.rng
    }

    /// Look up a user by id
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

fn generate_subscription(rng: &mut Lcg, i: u32, user_id: &str, now: DateTime<Utc>) -> Subscription {
    let plan = rng.pick(&PLANS);
    let status = if plan == Plan::Free {
        SubscriptionStatus::Canceled
    } else {
        rng.pick(&PAID_STATUSES)
    };
    let start_date = now - Duration::days(rng.randint(0, 300));
    let end_date = (status != SubscriptionStatus::Active)
        .then(|| start_date + Duration::days(rng.randint(30, 365)));

    Subscription {
        id: format!("s_{i}"),
        user_id: user_id.to_string(),
        plan,
        status,
        start_date,
        end_date,
    }
}

fn generate_progress(rng: &mut Lcg, i: u32, user_id: &str, now: DateTime<Utc>) -> StudentProgress {
    let topics: IndexMap<Topic, u8> = Topic::ALL
        .into_iter()
        .map(|topic| (topic, u8::try_from(rng.randint(0, 100)).unwrap_or_default()))
        .collect();
    let sum: u32 = topics.values().map(|&pct| u32::from(pct)).sum();
    let progress_pct = rounded_mean(sum, 7);

    let test_count = rng.randint(1, 6);
    let completed_tests = (0..test_count)
        .map(|k| CompletedTest {
            id: format!("t_{i}_{k}"),
            title: format!("Mock Test {}", k + 1),
            score_pct: u8::try_from(rng.randint(35, 100)).unwrap_or_default(),
            date: now - Duration::days(rng.randint(1, 120)),
        })
        .collect();

    let status = rng.pick(&CERTIFICATIONS);
    let issued_on = (status == CertificationStatus::Certified)
        .then(|| now - Duration::days(rng.randint(1, 120)));

    StudentProgress {
        user_id: user_id.to_string(),
        progress_pct,
        topics,
        completed_tests,
        certification: Certification { status, issued_on },
    }
}

/// Mean rounded half up, as a percentage
pub(crate) fn rounded_mean(sum: u32, count: u32) -> u8 {
    if count == 0 {
        return 0;
    }
    u8::try_from((sum * 2 + count) / (count * 2)).unwrap_or(u8::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        Dataset::generate(42, Utc::now())
    }

    #[test]
    fn test_lcg_first_values() {
        let mut rng = Lcg::new(42);
        // (42 * 1664525 + 1013904223) mod 2^32
        assert_eq!(rng.next_f64(), 1_083_814_273.0 / 4_294_967_296.0);
    }

    #[test]
    fn test_lcg_randint_bounds() {
        let mut rng = Lcg::new(7);
        for _ in 0..1000 {
            let value = rng.randint(5, 15);
            assert!((5..=15).contains(&value));
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let now = Utc::now();
        let a = Dataset::generate(42, now);
        let b = Dataset::generate(42, now);

        assert_eq!(a.users, b.users);
        assert_eq!(a.transactions, b.transactions);
    }

    #[test]
    fn test_role_split() {
        let data = dataset();

        assert_eq!(data.users.len(), 90);
        assert_eq!(data.teachers.len(), 6);
        let students = data.users.iter().filter(|u| u.role == Role::Student).count();
        assert_eq!(students, 84);
        assert_eq!(data.subscriptions.len(), 84);
        assert_eq!(data.progress.len(), 84);
        assert!(data.teachers.iter().all(|t| t.id.ends_with('0') || t.id.ends_with('5')));
    }

    #[test]
    fn test_user_shape() {
        let data = dataset();
        let user = data.user("u_1").unwrap();

        assert!(user.name.ends_with(" 1"));
        assert!(user.email.ends_with("_1@example.com"));
        assert!(!user.email.contains(' '));
        assert!(user.last_login_at <= data.now);
    }

    #[test]
    fn test_progress_is_rounded_topic_mean() {
        let data = dataset();
        for record in data.progress.values() {
            assert_eq!(record.topics.len(), 7);
            let sum: u32 = record.topics.values().map(|&v| u32::from(v)).sum();
            assert_eq!(record.progress_pct, rounded_mean(sum, 7));
            assert!((1..=6).contains(&record.completed_tests.len()));
            assert_eq!(
                record.certification.issued_on.is_some(),
                record.certification.status == CertificationStatus::Certified
            );
        }
    }

    #[test]
    fn test_subscription_rules() {
        let data = dataset();
        for sub in &data.subscriptions {
            if sub.plan == Plan::Free {
                assert_eq!(sub.status, SubscriptionStatus::Canceled);
            }
            assert_eq!(sub.end_date.is_none(), sub.status == SubscriptionStatus::Active);
        }
    }

    #[test]
    fn test_transactions_reference_students() {
        let data = dataset();

        assert_eq!(data.transactions.len(), 140);
        for tx in &data.transactions {
            let payer = data.user(&tx.user_id).unwrap();
            assert_eq!(payer.role, Role::Student);
            assert!(AMOUNTS.contains(&tx.amount_inr));
        }
    }

    #[test]
    fn test_notifications_seed() {
        let data = dataset();

        assert_eq!(data.notifications.len(), 18);
        assert_eq!(data.notifications.iter().filter(|n| !n.read).count(), 6);
        assert_eq!(data.notifications[1].title, "Payment failed");
        assert_eq!(
            data.notifications[5].link.as_deref(),
            Some("/super-admin?tab=analytics")
        );
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(0, 0), 0);
        assert_eq!(rounded_mean(7, 2), 4);
        assert_eq!(rounded_mean(350, 7), 50);
        assert_eq!(rounded_mean(352, 7), 50);
        assert_eq!(rounded_mean(353, 7), 50);
        assert_eq!(rounded_mean(354, 7), 51);
    }
}
