//! Contract tests for the mock collaborators

#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use chrono::Utc;
use console_core::Role;
use console_core::types::NotificationType;
use console_service::mock::{
    MockAdminService, MockAuthService, MockNotificationService, SUPER_ADMIN_EMAIL,
    SUPER_ADMIN_PASSWORD,
};
use console_service::{
    AccountStatusFilter, AdminService, AuthService, NotificationQuery, NotificationService,
    TeacherListParams, TransactionListParams, UserListParams,
};
use console_service::types::NotificationDraft;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_user_list_end_to_end_scenario() {
    let service = MockAdminService::new(42, Utc::now());

    let all = service.list_users(&UserListParams::new(1, 10)).await.unwrap();
    assert_eq!(all.total, 90);
    assert_eq!(all.items.len(), 10);

    let mut params = UserListParams::new(1, 10);
    params.status = AccountStatusFilter::Suspended;
    let suspended = service.list_users(&params).await.unwrap();

    let inactive = service
        .snapshot()
        .users
        .iter()
        .filter(|u| !u.is_active)
        .count() as u64;
    assert!(suspended.total < 90);
    assert_eq!(suspended.total, inactive);
    assert!(suspended.items.iter().all(|u| !u.is_active));
}

#[tokio::test]
async fn test_login_roles_at_service_layer() {
    let auth = MockAuthService::new();

    let operator = auth
        .login_with_email(SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD)
        .await
        .unwrap();
    assert_eq!(operator.role, Role::SuperAdmin);

    let other = auth.login_with_email("random@x.com", "whatever").await.unwrap();
    assert_eq!(other.role, Role::Admin);
}

#[tokio::test]
async fn test_cursor_walk_visits_every_item_once() {
    let feed = MockNotificationService::seeded(42, Utc::now());
    let mut seen = HashSet::new();
    let mut query = NotificationQuery::default();
    let mut calls = 0;

    loop {
        let page = feed.list(&query).await.unwrap();
        calls += 1;
        for item in page.items {
            assert!(seen.insert(item.id), "duplicate item");
        }
        match page.next_cursor {
            Some(cursor) => query = query.after(Some(cursor)),
            None => break,
        }
    }

    assert_eq!(seen.len(), 18);
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn test_teacher_search_and_transaction_paging() {
    let service = MockAdminService::new(42, Utc::now());
    let teacher = service.snapshot().teachers[0].clone();

    let mut params = TeacherListParams::new(1, 10);
    params.search = Some(teacher.email.to_uppercase());
    let found = service.list_teachers(&params).await.unwrap();
    assert_eq!(found.items, vec![teacher]);

    let last = service
        .list_transactions(&TransactionListParams::new(3, 50))
        .await
        .unwrap();
    assert_eq!(last.total, 140);
    assert_eq!(last.items.len(), 40);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_user_pages_respect_pagination_invariant(
        size_index in 0usize..3,
        page_seed in 0u32..100,
        role_filter in prop_oneof![Just(None), Just(Some(Role::Student)), Just(Some(Role::Teacher))],
    ) {
        let rt = runtime();
        let service = MockAdminService::new(42, Utc::now());
        let page_size = [10u32, 20, 50][size_index];

        let mut params = UserListParams::new(1, page_size);
        params.role = role_filter;
        let first = rt.block_on(service.list_users(&params)).unwrap();
        let total = first.total;

        let pages = u32::try_from(total.div_ceil(u64::from(page_size)).max(1)).unwrap();
        params.window.page = page_seed % pages + 1;
        let page = rt.block_on(service.list_users(&params)).unwrap();

        let skipped = u64::from(params.window.page - 1) * u64::from(page_size);
        let expected = u64::from(page_size).min(total.saturating_sub(skipped));
        prop_assert_eq!(page.total, total);
        prop_assert_eq!(page.items.len() as u64, expected);
    }

    #[test]
    fn prop_cursor_walk_terminates_without_gaps(
        extra in 0usize..25,
        limit in 1usize..12,
        unread in any::<bool>(),
    ) {
        let rt = runtime();
        let feed = MockNotificationService::seeded(42, Utc::now());
        for i in 0..extra {
            let draft = NotificationDraft {
                title: Some(format!("Background job {i}")),
                kind: Some(NotificationType::System),
                ..NotificationDraft::default()
            };
            rt.block_on(feed.push(draft)).unwrap();
        }

        let eligible: HashSet<String> = feed
            .all()
            .into_iter()
            .filter(|n| !unread || !n.read)
            .map(|n| n.id)
            .collect();

        let mut query = NotificationQuery { limit, unread, ..NotificationQuery::default() };
        let mut seen = HashSet::new();
        let mut calls = 0usize;
        loop {
            let page = rt.block_on(feed.list(&query)).unwrap();
            calls += 1;
            for item in page.items {
                prop_assert!(seen.insert(item.id));
            }
            match page.next_cursor {
                Some(cursor) => query = query.after(Some(cursor)),
                None => break,
            }
        }

        prop_assert_eq!(&seen, &eligible);
        prop_assert!(calls <= eligible.len().div_ceil(limit).max(1));
    }
}
