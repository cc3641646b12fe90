use axum::{extract::State, Json};
use tracing::instrument;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, AppJson, Result},
    middleware::Identity,
    models::{
        auth::{
            AuthData, LoginRequest, MeData, PasswordResetComplete, PasswordResetRequest,
            RegisterRequest, UserData, VerifyEmailRequest,
        },
        common::{parse_role, ApiResponse},
    },
    services::account_service::RESET_REQUESTED_MESSAGE,
};

/// POST /api/v1/auth/register
///
/// Create a student or company account. The verification e-mail is sent
/// best-effort; registration succeeds regardless.
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<Json<ApiResponse<UserData>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let role = parse_role(&request.role)?;

    let user = state
        .account_service
        .register(&request.email, &request.password, role, request.full_name)
        .await?;

    Ok(Json(ApiResponse::data_with_message(
        user.into(),
        "Check your inbox to verify your email address",
    )))
}

/// POST /api/v1/auth/login
///
/// Issue an identity token for valid credentials. Unknown address and wrong
/// password are indistinguishable (both 401).
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthData>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let (token, user) = state
        .account_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(ApiResponse::data(AuthData {
        token,
        expires_in: state.token_service.validity_seconds(),
        user: user.into(),
    })))
}

/// POST /api/v1/auth/verify-email
#[instrument(skip(state, request))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(request): AppJson<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<UserData>>> {
    let user = state.account_service.verify_email(request.token).await?;

    Ok(Json(ApiResponse::data_with_message(
        user.into(),
        "Email verified",
    )))
}

/// POST /api/v1/auth/password-reset/request
///
/// Always answers with the same message, whether or not the address is
/// registered.
#[instrument(skip(state, request))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppJson(request): AppJson<PasswordResetRequest>,
) -> Result<Json<ApiResponse<()>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    state
        .account_service
        .request_password_reset(&request.email)
        .await?;

    Ok(Json(ApiResponse::message(RESET_REQUESTED_MESSAGE)))
}

/// POST /api/v1/auth/password-reset/complete
#[instrument(skip(state, request))]
pub async fn complete_password_reset(
    State(state): State<AppState>,
    AppJson(request): AppJson<PasswordResetComplete>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .account_service
        .complete_password_reset(request.token, &request.new_password)
        .await?;

    Ok(Json(ApiResponse::message("Password updated")))
}

/// GET /api/v1/auth/me
///
/// Identity plus the current plan derived from the latest completed
/// transaction.
#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<MeData>>> {
    let user = state.account_service.get_user(identity.user_id).await?;
    let plan = state
        .subscription_service
        .resolve_current_plan(identity.user_id)
        .await?;

    Ok(Json(ApiResponse::data(MeData {
        user: user.into(),
        plan: plan.plan.as_str().to_string(),
        plan_active: plan.is_active,
        plan_expired: plan.is_expired,
    })))
}
