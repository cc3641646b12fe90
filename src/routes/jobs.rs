use axum::{
    extract::{Path, State},
    Json,
};
use entity::sea_orm_active_enums::{ApplicationStatus, UserRole};
use entity::{applications, jobs};
use sea_orm::{entity::*, query::*};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, AppJson, Result},
    middleware::Identity,
    models::{
        common::ApiResponse,
        jobs::{
            ApplicationData, ApplyRequest, CreateJobRequest, JobData, UpdateApplicationRequest,
            UpdateJobRequest,
        },
    },
};

/// GET /api/v1/jobs: public listing of open postings
#[instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<JobData>>>> {
    let jobs = jobs::Entity::find()
        .filter(jobs::Column::IsOpen.eq(true))
        .order_by_desc(jobs::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::data(
        jobs.into_iter().map(JobData::from).collect(),
    )))
}

/// GET /api/v1/jobs/{id}: public
#[instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobData>>> {
    let job = find_job(&state, id).await?;
    Ok(Json(ApiResponse::data(job.into())))
}

/// POST /api/v1/jobs: company only
#[instrument(skip(state, request))]
pub async fn create_job(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(request): AppJson<CreateJobRequest>,
) -> Result<Json<ApiResponse<JobData>>> {
    identity.require_role(UserRole::Company)?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let now = OffsetDateTime::now_utc();
    let job = jobs::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(identity.user_id),
        title: Set(request.title),
        description: Set(request.description),
        location: Set(request.location),
        employment_type: Set(request.employment_type),
        is_open: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    Ok(Json(ApiResponse::data(job.into())))
}

/// PATCH /api/v1/jobs/{id}: owning company only
#[instrument(skip(state, request))]
pub async fn update_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateJobRequest>,
) -> Result<Json<ApiResponse<JobData>>> {
    identity.require_role(UserRole::Company)?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = find_owned_job(&state, id, &identity).await?;

    let mut active: jobs::ActiveModel = job.into();
    if let Some(title) = request.title {
        active.title = Set(title);
    }
    if let Some(description) = request.description {
        active.description = Set(description);
    }
    if let Some(location) = request.location {
        active.location = Set(Some(location));
    }
    if let Some(employment_type) = request.employment_type {
        active.employment_type = Set(Some(employment_type));
    }
    if let Some(is_open) = request.is_open {
        active.is_open = Set(is_open);
    }
    active.updated_at = Set(OffsetDateTime::now_utc());

    let job = active.update(&state.db).await?;

    Ok(Json(ApiResponse::data(job.into())))
}

/// POST /api/v1/jobs/{id}/apply: student only
#[instrument(skip(state, request))]
pub async fn apply_to_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<ApplyRequest>,
) -> Result<Json<ApiResponse<ApplicationData>>> {
    identity.require_role(UserRole::Student)?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = find_job(&state, id).await?;
    if !job.is_open {
        return Err(ApiError::Validation(
            "This posting is no longer accepting applications".to_string(),
        ));
    }

    let existing = applications::Entity::find()
        .filter(applications::Column::JobId.eq(id))
        .filter(applications::Column::StudentId.eq(identity.user_id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Validation(
            "You have already applied to this posting".to_string(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let application = applications::ActiveModel {
        id: Set(Uuid::new_v4()),
        job_id: Set(id),
        student_id: Set(identity.user_id),
        resume_url: Set(request.resume_url),
        cover_letter: Set(request.cover_letter),
        status: Set(ApplicationStatus::Submitted),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    Ok(Json(ApiResponse::data(application.into())))
}

/// GET /api/v1/jobs/{id}/applications: owning company only
#[instrument(skip(state))]
pub async fn list_job_applications(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ApplicationData>>>> {
    identity.require_role(UserRole::Company)?;
    find_owned_job(&state, id, &identity).await?;

    let applications = applications::Entity::find()
        .filter(applications::Column::JobId.eq(id))
        .order_by_desc(applications::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::data(
        applications.into_iter().map(ApplicationData::from).collect(),
    )))
}

/// GET /api/v1/applications/mine: the student's own applications
#[instrument(skip(state))]
pub async fn my_applications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<Vec<ApplicationData>>>> {
    identity.require_role(UserRole::Student)?;

    let applications = applications::Entity::find()
        .filter(applications::Column::StudentId.eq(identity.user_id))
        .order_by_desc(applications::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::data(
        applications.into_iter().map(ApplicationData::from).collect(),
    )))
}

/// PATCH /api/v1/applications/{id}: company owning the posting
#[instrument(skip(state, request))]
pub async fn update_application_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateApplicationRequest>,
) -> Result<Json<ApiResponse<ApplicationData>>> {
    identity.require_role(UserRole::Company)?;

    let status = parse_application_status(&request.status)?;

    let application = applications::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    // Ownership runs through the posting, not the application itself
    find_owned_job(&state, application.job_id, &identity).await?;

    let mut active: applications::ActiveModel = application.into();
    active.status = Set(status);
    active.updated_at = Set(OffsetDateTime::now_utc());
    let application = active.update(&state.db).await?;

    Ok(Json(ApiResponse::data(application.into())))
}

fn parse_application_status(s: &str) -> Result<ApplicationStatus> {
    match s {
        "reviewed" => Ok(ApplicationStatus::Reviewed),
        "accepted" => Ok(ApplicationStatus::Accepted),
        "rejected" => Ok(ApplicationStatus::Rejected),
        other => Err(ApiError::Validation(format!(
            "Unknown application status: {}",
            other
        ))),
    }
}

async fn find_job(state: &AppState, id: Uuid) -> Result<jobs::Model> {
    jobs::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job posting not found".to_string()))
}

async fn find_owned_job(state: &AppState, id: Uuid, identity: &Identity) -> Result<jobs::Model> {
    let job = find_job(state, id).await?;
    if job.company_id != identity.user_id && identity.role != UserRole::Admin {
        return Err(ApiError::Forbidden(
            "This posting belongs to another company".to_string(),
        ));
    }
    Ok(job)
}
