use entity::sea_orm_active_enums::UserRole;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    pub password: String,
    /// "student" or "company"; admins are provisioned out of band.
    pub role: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub token: String,
    pub expires_in: u64,
    pub user: UserData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<entity::users::Model> for UserData {
    fn from(user: entity::users::Model) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            role: user.role,
            full_name: user.full_name,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub token: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetComplete {
    pub token: Uuid,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeData {
    #[serde(flatten)]
    pub user: UserData,
    pub plan: String,
    pub plan_active: bool,
    pub plan_expired: bool,
}
