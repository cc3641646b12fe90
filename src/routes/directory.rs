use axum::{extract::State, Json};
use entity::sea_orm_active_enums::UserRole;
use entity::users;
use sea_orm::{entity::*, query::*};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    models::{common::ApiResponse, jobs::DirectoryEntry},
};

/// GET /api/v1/companies: public directory of company accounts
#[instrument(skip(state))]
pub async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DirectoryEntry>>>> {
    list_role(&state, UserRole::Company).await
}

/// GET /api/v1/students: public directory of student accounts
#[instrument(skip(state))]
pub async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DirectoryEntry>>>> {
    list_role(&state, UserRole::Student).await
}

async fn list_role(
    state: &AppState,
    role: UserRole,
) -> Result<Json<ApiResponse<Vec<DirectoryEntry>>>> {
    // Verified accounts only; the public directory must not leak emails
    let users = users::Entity::find()
        .filter(users::Column::Role.eq(role))
        .filter(users::Column::IsVerified.eq(true))
        .order_by_asc(users::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::data(
        users
            .into_iter()
            .map(|u| DirectoryEntry {
                user_id: u.id,
                full_name: u.full_name,
            })
            .collect(),
    )))
}
