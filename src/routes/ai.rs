use axum::{
    extract::{Path, State},
    Json,
};
use entity::sea_orm_active_enums::PlanTier;
use tracing::instrument;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, AppJson, Result},
    middleware::Identity,
    models::{
        ai::{AiTextData, InterviewQuestionsRequest, ResumeFeedbackRequest, UsageData},
        common::{parse_feature, ApiResponse, Feature},
    },
};

/// POST /api/v1/ai/resume-feedback
///
/// Chargeable: the usage counter is checked and incremented atomically
/// before the LLM call.
#[instrument(skip(state, request))]
pub async fn resume_feedback(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(request): AppJson<ResumeFeedbackRequest>,
) -> Result<Json<ApiResponse<AiTextData>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let usage = charge(&state, &identity, Feature::ResumeFeedback).await?;

    let content = state.ai_service.resume_feedback(&request.resume_text).await?;

    Ok(Json(ApiResponse::data(AiTextData {
        content,
        usage_remaining: usage.limit.map(|l| l - usage.current),
    })))
}

/// POST /api/v1/ai/interview-questions
#[instrument(skip(state, request))]
pub async fn interview_questions(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(request): AppJson<InterviewQuestionsRequest>,
) -> Result<Json<ApiResponse<AiTextData>>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let usage = charge(&state, &identity, Feature::InterviewQuestions).await?;

    let content = state
        .ai_service
        .interview_questions(&request.job_title, request.job_description.as_deref())
        .await?;

    Ok(Json(ApiResponse::data(AiTextData {
        content,
        usage_remaining: usage.limit.map(|l| l - usage.current),
    })))
}

/// GET /api/v1/ai/usage/{feature}
///
/// Read-only view of the caller's counter for one feature. Informational:
/// the chargeable endpoints re-check atomically, so this answer may be
/// stale by the time a charge lands.
#[instrument(skip(state))]
pub async fn usage_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(feature): Path<String>,
) -> Result<Json<ApiResponse<UsageData>>> {
    let feature = parse_feature(&feature)?;
    let plan = effective_plan(&state, &identity).await?;

    let usage = state
        .quota_service
        .check_usage_limit(identity.user_id, feature, identity.role, plan)
        .await?;

    Ok(Json(ApiResponse::data(UsageData {
        feature: feature.as_str().to_string(),
        allowed: usage.allowed,
        current: usage.current,
        limit: usage.limit,
    })))
}

/// Resolve the caller's effective plan and charge one invocation.
///
/// A provisionally-expired plan (past expiry, renewal pending) is treated as
/// free for limit purposes until the renewal charge lands.
async fn charge(
    state: &AppState,
    identity: &Identity,
    feature: Feature,
) -> Result<crate::services::quota_service::UsageStatus> {
    let plan = effective_plan(state, identity).await?;

    state
        .quota_service
        .check_and_increment(identity.user_id, feature, identity.role, plan)
        .await
}

async fn effective_plan(state: &AppState, identity: &Identity) -> Result<PlanTier> {
    let plan_status = state
        .subscription_service
        .resolve_current_plan(identity.user_id)
        .await?;
    Ok(if plan_status.is_active {
        plan_status.plan
    } else {
        PlanTier::Free
    })
}
