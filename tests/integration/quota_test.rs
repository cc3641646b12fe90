use std::sync::Arc;

use entity::sea_orm_active_enums::{PlanTier, UserRole};
use tokio::sync::Barrier;
use worklink::config::QuotaConfig;
use worklink::error::ApiError;
use worklink::models::common::Feature;
use worklink::services::quota_service::QuotaService;

use super::common::{create_test_user, setup_test_db};

fn quota_config() -> QuotaConfig {
    QuotaConfig {
        free_resume_feedback_monthly: 3,
        free_interview_questions_monthly: 5,
        basic_resume_feedback_monthly: 20,
        basic_interview_questions_monthly: 20,
    }
}

/// Ten concurrent callers against a limit of 3: exactly 3 must get through.
/// The row lock in check_and_increment serializes them.
#[tokio::test]
async fn test_check_and_increment_is_atomic_under_concurrency() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;
    let service = Arc::new(QuotaService::new(db, &quota_config()));

    let concurrency = 10;
    let barrier = Arc::new(Barrier::new(concurrency));

    let tasks: Vec<_> = (0..concurrency)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                barrier.wait().await;
                service
                    .check_and_increment(
                        user_id,
                        Feature::ResumeFeedback,
                        UserRole::Student,
                        PlanTier::Free,
                    )
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    let mut granted = 0;
    let mut rejected = 0;
    for result in results {
        match result.expect("task panicked") {
            Ok(status) => {
                assert!(status.allowed);
                granted += 1;
            }
            Err(ApiError::QuotaExceeded(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(rejected, 7);

    // And the counter itself must sit exactly at the limit.
    let status = service
        .check_usage_limit(
            user.id,
            Feature::ResumeFeedback,
            UserRole::Student,
            PlanTier::Free,
        )
        .await
        .expect("check failed");
    assert_eq!(status.current, 3);
    assert!(!status.allowed);
}

/// The unsynchronized primitives do what they say: increment_usage counts
/// unconditionally, so a caller that checked before incrementing can push
/// the counter past the limit. check_usage_limit then reports the overrun.
#[tokio::test]
async fn test_primitive_increment_is_unconditional() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;
    let service = QuotaService::new(db, &quota_config());

    let before = service
        .check_usage_limit(
            user.id,
            Feature::InterviewQuestions,
            UserRole::Student,
            PlanTier::Free,
        )
        .await
        .expect("check failed");
    assert!(before.allowed);
    assert_eq!(before.current, 0);

    // Limit is 5; increment 6 times as interleaved check-then-act callers
    // would under contention.
    for _ in 0..6 {
        service
            .increment_usage(user.id, Feature::InterviewQuestions)
            .await
            .expect("increment failed");
    }

    let after = service
        .check_usage_limit(
            user.id,
            Feature::InterviewQuestions,
            UserRole::Student,
            PlanTier::Free,
        )
        .await
        .expect("check failed");
    assert_eq!(after.current, 6);
    assert!(!after.allowed);
    assert!(after.message.is_some());
}

/// Premium plans and admins never hit a ceiling.
#[tokio::test]
async fn test_unbounded_callers_are_never_rejected() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let premium_user = create_test_user(&db, UserRole::Student).await;
    let admin = create_test_user(&db, UserRole::Admin).await;
    let service = QuotaService::new(db, &quota_config());

    for _ in 0..10 {
        let status = service
            .check_and_increment(
                premium_user.id,
                Feature::ResumeFeedback,
                UserRole::Student,
                PlanTier::Premium,
            )
            .await
            .expect("premium caller was rejected");
        assert!(status.allowed);
        assert_eq!(status.limit, None);
    }

    let status = service
        .check_and_increment(
            admin.id,
            Feature::ResumeFeedback,
            UserRole::Admin,
            PlanTier::Free,
        )
        .await
        .expect("admin was rejected");
    assert_eq!(status.limit, None);
}
