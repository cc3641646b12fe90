use axum::{extract::State, Json};
use entity::sea_orm_active_enums::UserRole;
use entity::users;
use sea_orm::{entity::*, query::*};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::Identity,
    models::{auth::UserData, common::ApiResponse},
};

/// GET /api/v1/admin/users: admin only
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<Vec<UserData>>>> {
    identity.require_role(UserRole::Admin)?;

    let users = users::Entity::find()
        .order_by_desc(users::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::data(
        users.into_iter().map(UserData::from).collect(),
    )))
}
