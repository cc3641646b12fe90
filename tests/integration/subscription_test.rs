use std::sync::Arc;

use entity::sea_orm_active_enums::{PlanTier, TransactionStatus, UserRole};
use entity::transactions;
use rust_decimal::Decimal;
use sea_orm::{entity::*, DatabaseConnection};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;
use worklink::error::ApiError;
use worklink::services::payment_gateway::PaymentGateway;
use worklink::services::subscription_service::{add_one_month, SubscriptionService};

use super::common::{create_test_user, setup_test_db, test_payment_config};

fn service(db: DatabaseConnection) -> SubscriptionService {
    let gateway = Arc::new(PaymentGateway::new(&test_payment_config()));
    SubscriptionService::new(db, gateway)
}

#[tokio::test]
async fn test_checkout_creates_pending_transaction_with_signed_form() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;
    let service = service(db);

    let (txn, endpoint, form) = service
        .initiate_checkout(&user, PlanTier::Basic)
        .await
        .expect("checkout failed");

    assert_eq!(txn.status, TransactionStatus::Pending);
    assert_eq!(txn.plan, Some(PlanTier::Basic));
    assert_eq!(txn.amount, Decimal::from(5));
    assert!(txn.expires_at.is_none());

    assert!(endpoint.ends_with("/purchase"));
    assert_eq!(form.get("tran_id"), Some(&txn.provider_tran_id));
    assert_eq!(form.get("amount").map(String::as_str), Some("5.00"));
    assert!(form.contains_key("hash"));
}

/// The $5 student path end to end: pending -> provider approves ->
/// completed with a one-month window, and a replayed approval changes
/// nothing.
#[tokio::test]
async fn test_reconcile_completion_is_idempotent() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;
    let service = service(db);

    let (txn, _, _) = service
        .initiate_checkout(&user, PlanTier::Basic)
        .await
        .expect("checkout failed");

    let approved = json!({"status": 0, "data": {"payment_status": "success"}});
    let completed = service
        .reconcile(&approved, &txn.provider_tran_id, user.id, user.role)
        .await
        .expect("reconcile failed");

    assert_eq!(completed.status, TransactionStatus::Completed);
    assert!(completed.transaction_date.is_some());
    assert_eq!(completed.auto_renew, Some(true));
    let expires_at = completed.expires_at.expect("expiry not set");
    assert_eq!(
        expires_at,
        add_one_month(completed.transaction_date.unwrap())
    );
    assert_eq!(completed.next_billing_date, Some(expires_at));

    // Replay the same provider response: terminal record, nothing moves.
    let replayed = service
        .reconcile(&approved, &txn.provider_tran_id, user.id, user.role)
        .await
        .expect("replay failed");
    assert_eq!(replayed.status, TransactionStatus::Completed);
    assert_eq!(replayed.expires_at, Some(expires_at));
    assert_eq!(replayed.transaction_date, completed.transaction_date);

    // And the plan now resolves from that transaction.
    let plan = service
        .resolve_current_plan(user.id)
        .await
        .expect("plan resolution failed");
    assert_eq!(plan.plan, PlanTier::Basic);
    assert!(plan.is_active);
}

#[tokio::test]
async fn test_reconcile_declined_and_uninterpretable_responses() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;
    let service = service(db);

    let (txn, _, _) = service
        .initiate_checkout(&user, PlanTier::Premium)
        .await
        .expect("checkout failed");

    // Uninterpretable response: stays pending, untouched.
    let noise = json!({"status": 11, "message": "still processing"});
    let unchanged = service
        .reconcile(&noise, &txn.provider_tran_id, user.id, user.role)
        .await
        .expect("reconcile failed");
    assert_eq!(unchanged.status, TransactionStatus::Pending);
    assert!(unchanged.provider_metadata.is_none());

    // Then a decline lands.
    let declined = json!({"data": {"payment_status_code": 3}});
    let failed = service
        .reconcile(&declined, &txn.provider_tran_id, user.id, user.role)
        .await
        .expect("reconcile failed");
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert!(failed.expires_at.is_none());
}

#[tokio::test]
async fn test_reconcile_enforces_ownership() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let owner = create_test_user(&db, UserRole::Student).await;
    let stranger = create_test_user(&db, UserRole::Student).await;
    let admin = create_test_user(&db, UserRole::Admin).await;
    let service = service(db);

    let (txn, _, _) = service
        .initiate_checkout(&owner, PlanTier::Basic)
        .await
        .expect("checkout failed");

    let approved = json!({"status": 0});
    let err = service
        .reconcile(&approved, &txn.provider_tran_id, stranger.id, stranger.role)
        .await
        .expect_err("stranger should be rejected");
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Admins may act on any record.
    let reconciled = service
        .reconcile(&approved, &txn.provider_tran_id, admin.id, admin.role)
        .await
        .expect("admin reconcile failed");
    assert_eq!(reconciled.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_cancel_and_downgrade_lifecycle() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Company).await;
    let service = service(db);

    let (txn, _, _) = service
        .initiate_checkout(&user, PlanTier::Basic)
        .await
        .expect("checkout failed");

    // Cancelling a pending transaction is rejected.
    let err = service
        .cancel_auto_renew(&txn.provider_tran_id, user.id, user.role)
        .await
        .expect_err("pending cancel should fail");
    assert!(matches!(err, ApiError::Validation(_)));

    service
        .reconcile(&json!({"status": 0}), &txn.provider_tran_id, user.id, user.role)
        .await
        .expect("reconcile failed");

    let cancelled = service
        .cancel_auto_renew(&txn.provider_tran_id, user.id, user.role)
        .await
        .expect("cancel failed");
    assert_eq!(cancelled.auto_renew, Some(false));
    assert_eq!(cancelled.next_billing_date, None);
    // Paid-through window survives a cancel.
    assert!(cancelled.expires_at.expect("expiry") > OffsetDateTime::now_utc());

    let downgraded = service
        .downgrade_to_free(&txn.provider_tran_id, user.id, user.role)
        .await
        .expect("downgrade failed");
    assert!(downgraded.expires_at.expect("expiry") <= OffsetDateTime::now_utc());

    let plan = service
        .resolve_current_plan(user.id)
        .await
        .expect("plan resolution failed");
    assert_eq!(plan.plan, PlanTier::Free);
    assert!(!plan.is_active);
}

#[tokio::test]
async fn test_fix_plan_backfills_from_amount_and_role() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let user = create_test_user(&db, UserRole::Student).await;

    // A record from before the plan column existed.
    let now = OffsetDateTime::now_utc();
    let tran_id = format!("wl-{}", Uuid::new_v4());
    transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        provider_tran_id: Set(tran_id.clone()),
        amount: Set(Decimal::from(5)),
        currency: Set("USD".to_string()),
        plan: Set(None),
        status: Set(TransactionStatus::Completed),
        transaction_date: Set(Some(now)),
        expires_at: Set(Some(add_one_month(now))),
        next_billing_date: Set(Some(add_one_month(now))),
        auto_renew: Set(Some(true)),
        provider_metadata: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .expect("insert failed");

    let service = service(db);

    let fixed = service.fix_plan(&tran_id).await.expect("fix_plan failed");
    assert_eq!(fixed.plan, Some(PlanTier::Basic));

    // Idempotent: a second run leaves the label alone.
    let again = service.fix_plan(&tran_id).await.expect("fix_plan failed");
    assert_eq!(again.plan, Some(PlanTier::Basic));
}
