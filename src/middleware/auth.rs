use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    services::token_service::TokenService,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, Method},
    middleware::Next,
    response::Response,
};
use entity::sea_orm_active_enums::UserRole;
use uuid::Uuid;

/// Public-route allowlist: exact prefix match. These paths never require a
/// token.
const PUBLIC_PREFIXES: &[&str] = &[
    "/api/v1/auth/register",
    "/api/v1/auth/login",
    "/api/v1/auth/verify-email",
    "/api/v1/auth/password-reset/request",
    "/api/v1/auth/password-reset/complete",
];

/// GET-only exceptions for the public listing endpoints. Mutations under the
/// same prefixes still require a token.
const PUBLIC_GET_PREFIXES: &[&str] = &["/api/v1/jobs", "/api/v1/companies", "/api/v1/students"];

pub fn is_public_route(method: &Method, path: &str) -> bool {
    if PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    method == Method::GET && PUBLIC_GET_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Verified identity claims, attached to the request after authentication.
/// Downstream handlers must treat these as already authenticated and never
/// re-parse the raw token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
}

/// Request authenticator.
///
/// Requests matching the public allowlist pass through unchanged. Everything
/// else needs a bearer token; a missing or malformed header and a failed
/// verification all produce the same 401, so a forged token is
/// indistinguishable from an absent one.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    if is_public_route(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.token_service.verify(token)?;

    let identity = Identity {
        user_id: TokenService::user_id_from_claims(&claims)?,
        email: claims.email.clone(),
        role: TokenService::role_from_claims(&claims)?,
        is_verified: claims.verified,
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Axum extractor for the verified identity.
///
/// Only works behind auth_middleware; elsewhere it rejects with 401.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

impl Identity {
    /// Role gate for handlers. Admins pass every gate.
    pub fn require_role(&self, role: UserRole) -> Result<()> {
        if self.role == role || self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "This action requires the {} role",
                role.as_str()
            )))
        }
    }
}
