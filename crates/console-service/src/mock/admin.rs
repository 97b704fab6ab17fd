//! Mock admin data service over the seeded dataset

use super::dataset::{Dataset, rounded_mean};
use super::{CallCounters, simulate_latency};
use crate::error::{ServiceError, ServiceResult};
use crate::service::AdminService;
use crate::types::{
    ActivityLogPage, Auxiliary, ListResponse, MutationAck, SortSpec,
    StudentProgressEntry, TeacherListParams, TransactionListParams, UserListParams,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use console_core::types::{
    ActivityLog, Analytics, GrowthPoint, PaymentStatus, RevenuePoint, RevenueSummary,
    StudentProfile, StudentSummary, SubscriptionStatus, Topic, TopicPopularity,
};
use console_core::utils::start_of_day;
use console_core::{DateRange, Role, Teacher, Transaction, User};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Mock admin service backed by a seeded in-memory dataset
#[derive(Debug, Clone)]
pub struct MockAdminService {
    data: Arc<Mutex<Dataset>>,
    latency_ms: u64,
    mutation_failure: Arc<RwLock<Option<String>>>,
    calls: CallCounters,
}

impl MockAdminService {
    /// Create a service over the dataset generated from `seed`
    pub fn new(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            data: Arc::new(Mutex::new(Dataset::generate(seed, now))),
            latency_ms: 0,
            mutation_failure: Arc::new(RwLock::new(None)),
            calls: CallCounters::default(),
        }
    }

    /// Set simulated latency for every call
    pub const fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Configure writes to fail
    pub fn with_mutation_failure(self, message: impl Into<String>) -> Self {
        self.set_mutation_failure(Some(message.into()));
        self
    }

    /// Toggle write failures at runtime; `None` restores normal behaviour
    pub fn set_mutation_failure(&self, message: Option<String>) {
        *self.mutation_failure.write() = message;
    }

    /// Number of calls made to `operation` so far
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.get(operation)
    }

    /// Reference instant of the dataset
    pub fn now(&self) -> DateTime<Utc> {
        self.data.lock().now
    }

    /// Copy of the current dataset
    pub fn snapshot(&self) -> Dataset {
        self.data.lock().clone()
    }

    async fn enter(&self, operation: &'static str) {
        self.calls.record(operation);
        debug!(operation, latency_ms = self.latency_ms, "Mock admin call");
        simulate_latency(self.latency_ms).await;
    }
}

fn matches_search(search: Option<&str>, name: &str, email: &str) -> bool {
    match search.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let q = q.to_lowercase();
            name.to_lowercase().contains(&q) || email.to_lowercase().contains(&q)
        }
        None => true,
    }
}

fn compare_users(a: &User, b: &User, spec: &SortSpec) -> Ordering {
    let ordering = match spec.field.as_str() {
        "name" => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        "email" => a.email.to_lowercase().cmp(&b.email.to_lowercase()),
        "role" => a.role.as_str().cmp(b.role.as_str()),
        "last_login_at" => a.last_login_at.cmp(&b.last_login_at),
        _ => Ordering::Equal,
    };
    spec.direction.apply(ordering)
}

fn sort_users(list: &mut [User], sort: &[SortSpec]) {
    // Each spec is a full stable pass, so the last entry dominates.
    for spec in sort {
        list.sort_by(|a, b| compare_users(a, b, spec));
    }
}

fn filter_transactions(data: &Dataset, params: &TransactionListParams) -> Vec<Transaction> {
    data.transactions
        .iter()
        .filter(|t| matches_search(params.search.as_deref(), &t.name, &t.email))
        .filter(|t| params.status.is_none_or(|status| t.status == status))
        .filter(|t| params.min_amount.is_none_or(|min| t.amount_inr >= min))
        .filter(|t| params.max_amount.is_none_or(|max| t.amount_inr <= max))
        .filter(|t| params.date_range.is_none_or(|range| range.contains(t.date)))
        .cloned()
        .collect()
}

#[async_trait]
impl AdminService for MockAdminService {
    async fn list_users(&self, params: &UserListParams) -> ServiceResult<ListResponse<User>> {
        self.enter("list_users").await;
        let data = self.data.lock();

        let mut list: Vec<User> = data
            .users
            .iter()
            .filter(|u| matches_search(params.search.as_deref(), &u.name, &u.email))
            .filter(|u| params.role.is_none_or(|role| u.role == role))
            .filter(|u| params.status.matches(u.is_active))
            .cloned()
            .collect();
        sort_users(&mut list, &params.sort);

        let total = list.len() as u64;
        let items = params.window.slice(&list);
        let progress = items
            .iter()
            .map(|u| StudentProgressEntry {
                user_id: u.id.clone(),
                progress: (u.role == Role::Student).then(|| {
                    data.progress
                        .get(&u.id)
                        .map_or(0, |record| record.progress_pct)
                }),
            })
            .collect();

        Ok(ListResponse::new(items, total).with_auxiliary(Auxiliary::StudentProgress(progress)))
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> ServiceResult<MutationAck> {
        self.enter("set_user_active").await;

        let failure = self.mutation_failure.read().clone();
        if let Some(message) = failure {
            return Err(ServiceError::remote_failure(message));
        }

        let mut data = self.data.lock();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
        user.is_active = is_active;

        Ok(MutationAck { success: true })
    }

    async fn student_summary(&self, range: &DateRange) -> ServiceResult<StudentSummary> {
        self.enter("student_summary").await;
        let data = self.data.lock();

        let today = start_of_day(range.to);
        let students: Vec<&User> = data.users.iter().filter(|u| u.role == Role::Student).collect();
        let progress_sum: u32 = students
            .iter()
            .map(|u| data.progress.get(&u.id).map_or(0, |p| u32::from(p.progress_pct)))
            .sum();
        let total = u32::try_from(students.len()).unwrap_or(u32::MAX);

        Ok(StudentSummary {
            total_students: u64::from(total),
            average_completion: rounded_mean(progress_sum, total),
            active_today: students.iter().filter(|u| u.last_login_at >= today).count() as u64,
        })
    }

    async fn student_profile(&self, user_id: &str) -> ServiceResult<StudentProfile> {
        self.enter("student_profile").await;
        let data = self.data.lock();

        let user = data
            .user(user_id)
            .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
        let progress = data
            .progress
            .get(user_id)
            .ok_or_else(|| ServiceError::not_found(format!("student profile {user_id}")))?;
        let subscription = data
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned();

        Ok(StudentProfile {
            user: user.clone(),
            progress: progress.clone(),
            subscription,
        })
    }

    async fn revenue_overview(&self, range: &DateRange) -> ServiceResult<RevenueSummary> {
        self.enter("revenue_overview").await;
        let data = self.data.lock();

        let month_start = range.to - Duration::days(30);
        let in_range: Vec<&Transaction> = data
            .transactions
            .iter()
            .filter(|t| range.contains(t.date))
            .collect();

        Ok(RevenueSummary {
            monthly_revenue_inr: in_range
                .iter()
                .filter(|t| t.status == PaymentStatus::Success && t.date >= month_start)
                .map(|t| t.amount_inr)
                .sum(),
            lifetime_revenue_inr: data
                .transactions
                .iter()
                .filter(|t| t.status == PaymentStatus::Success)
                .map(|t| t.amount_inr)
                .sum(),
            active_subscriptions: data
                .subscriptions
                .iter()
                .filter(|s| s.status == SubscriptionStatus::Active)
                .count() as u64,
            failed_payments: in_range
                .iter()
                .filter(|t| t.status == PaymentStatus::Failed)
                .count() as u64,
        })
    }

    async fn list_transactions(
        &self,
        params: &TransactionListParams,
    ) -> ServiceResult<ListResponse<Transaction>> {
        self.enter("list_transactions").await;
        let data = self.data.lock();

        let list = filter_transactions(&data, params);
        let total = list.len() as u64;
        Ok(ListResponse::new(params.window.slice(&list), total))
    }

    async fn list_teachers(
        &self,
        params: &TeacherListParams,
    ) -> ServiceResult<ListResponse<Teacher>> {
        self.enter("list_teachers").await;
        let data = self.data.lock();

        let list: Vec<Teacher> = data
            .teachers
            .iter()
            .filter(|t| matches_search(params.search.as_deref(), &t.name, &t.email))
            .cloned()
            .collect();
        let total = list.len() as u64;
        Ok(ListResponse::new(params.window.slice(&list), total))
    }

    async fn teacher_activity_logs(&self, teacher_id: &str) -> ServiceResult<ActivityLogPage> {
        self.enter("teacher_activity_logs").await;
        let mut data = self.data.lock();
        let now = data.now;

        let rng = data.rng();
        let count = rng.randint(5, 15);
        let items = (0..count)
            .map(|i| {
                let student = rng.randint(1, 90);
                ActivityLog {
                    id: format!("log_{teacher_id}_{i}"),
                    text: format!("Viewed student u_{student} progress"),
                    at: now - Duration::days(rng.randint(0, 20)),
                }
            })
            .collect();

        Ok(ActivityLogPage { items })
    }

    async fn analytics(&self, range: &DateRange) -> ServiceResult<Analytics> {
        self.enter("analytics").await;
        let mut data = self.data.lock();

        let days = 30;
        let base = range.to - Duration::days(days);
        let rng = data.rng();

        let growth = (0..=days)
            .map(|i| GrowthPoint {
                date: base + Duration::days(i),
                students_total: u64::try_from(1000 + i * rng.randint(5, 15)).unwrap_or_default(),
            })
            .collect();
        let topic_popularity = Topic::ALL
            .into_iter()
            .map(|topic| TopicPopularity {
                topic,
                count: u64::try_from(rng.randint(50, 300)).unwrap_or_default(),
            })
            .collect();
        let revenue_trend = (0..=days)
            .map(|i| RevenuePoint {
                date: base + Duration::days(i),
                revenue_inr: u64::try_from(rng.randint(1000, 20_000)).unwrap_or_default(),
            })
            .collect();

        Ok(Analytics {
            growth,
            topic_popularity,
            revenue_trend,
        })
    }
}
