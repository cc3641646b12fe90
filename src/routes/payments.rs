use axum::{
    extract::{Path, State},
    Json,
};
use entity::sea_orm_active_enums::UserRole;
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::{AppJson, Result},
    middleware::Identity,
    models::{
        common::{parse_plan, ApiResponse},
        payments::{CheckoutData, CheckoutRequest, PlanData, TransactionData},
    },
};

/// POST /api/v1/payments/checkout
///
/// Create a pending transaction and return the signed form the client posts
/// to the provider's purchase endpoint.
#[instrument(skip(state, request))]
pub async fn initiate_checkout(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(request): AppJson<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutData>>> {
    let plan = parse_plan(&request.plan)?;

    let user = state.account_service.get_user(identity.user_id).await?;
    let (transaction, endpoint, fields) = state
        .subscription_service
        .initiate_checkout(&user, plan)
        .await?;

    Ok(Json(ApiResponse::data(CheckoutData {
        transaction: transaction.into(),
        gateway_endpoint: endpoint,
        gateway_fields: fields,
    })))
}

/// POST /api/v1/payments/{tranId}/check
///
/// Poll the provider and reconcile the local record with its report.
#[instrument(skip(state))]
pub async fn check_transaction(
    State(state): State<AppState>,
    identity: Identity,
    Path(tran_id): Path<String>,
) -> Result<Json<ApiResponse<TransactionData>>> {
    let transaction = state
        .subscription_service
        .check_and_reconcile(&tran_id, identity.user_id, identity.role)
        .await?;

    Ok(Json(ApiResponse::data(transaction.into())))
}

/// POST /api/v1/payments/{tranId}/cancel-auto-renew
///
/// The subscription runs to its expiry and then lapses.
#[instrument(skip(state))]
pub async fn cancel_auto_renew(
    State(state): State<AppState>,
    identity: Identity,
    Path(tran_id): Path<String>,
) -> Result<Json<ApiResponse<TransactionData>>> {
    let transaction = state
        .subscription_service
        .cancel_auto_renew(&tran_id, identity.user_id, identity.role)
        .await?;

    Ok(Json(ApiResponse::data_with_message(
        transaction.into(),
        "Auto-renewal disabled; the plan stays active until it expires",
    )))
}

/// POST /api/v1/payments/{tranId}/downgrade
///
/// Immediate downgrade to free.
#[instrument(skip(state))]
pub async fn downgrade_to_free(
    State(state): State<AppState>,
    identity: Identity,
    Path(tran_id): Path<String>,
) -> Result<Json<ApiResponse<TransactionData>>> {
    let transaction = state
        .subscription_service
        .downgrade_to_free(&tran_id, identity.user_id, identity.role)
        .await?;

    Ok(Json(ApiResponse::data_with_message(
        transaction.into(),
        "Downgraded to the free plan",
    )))
}

/// GET /api/v1/payments/plan: the caller's current plan
#[instrument(skip(state))]
pub async fn current_plan(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<PlanData>>> {
    let status = state
        .subscription_service
        .resolve_current_plan(identity.user_id)
        .await?;

    Ok(Json(ApiResponse::data(PlanData {
        plan: status.plan,
        is_active: status.is_active,
        is_expired: status.is_expired,
    })))
}

/// POST /api/v1/payments/{tranId}/fix-plan: admin repair tool
///
/// Backfills a missing plan label from the charged amount and payer role.
#[instrument(skip(state))]
pub async fn fix_plan(
    State(state): State<AppState>,
    identity: Identity,
    Path(tran_id): Path<String>,
) -> Result<Json<ApiResponse<TransactionData>>> {
    identity.require_role(UserRole::Admin)?;

    let transaction = state.subscription_service.fix_plan(&tran_id).await?;

    Ok(Json(ApiResponse::data(transaction.into())))
}
