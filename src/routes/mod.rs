// Route modules
pub mod admin;
pub mod ai;
pub mod auth;
pub mod directory;
pub mod jobs;
pub mod payments;
pub mod uploads;

use crate::{
    app_state::AppState,
    middleware::{auth_middleware, logging_middleware},
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API v1 routes.
///
/// The authenticator runs over everything; public routes are exempted inside
/// the middleware via the allowlist, so handlers never see an unauthenticated
/// request unless their path is on it.
fn api_v1_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route(
            "/auth/password-reset/request",
            post(auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/complete",
            post(auth::complete_password_reset),
        )
        .route("/auth/me", get(auth::get_me))
        // Jobs & applications
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/jobs/{id}", get(jobs::get_job).patch(jobs::update_job))
        .route("/jobs/{id}/apply", post(jobs::apply_to_job))
        .route("/jobs/{id}/applications", get(jobs::list_job_applications))
        .route("/applications/mine", get(jobs::my_applications))
        .route("/applications/{id}", patch(jobs::update_application_status))
        // Public directories
        .route("/companies", get(directory::list_companies))
        .route("/students", get(directory::list_students))
        // Payments & plans
        .route("/payments/checkout", post(payments::initiate_checkout))
        .route("/payments/plan", get(payments::current_plan))
        .route("/payments/{tranId}/check", post(payments::check_transaction))
        .route(
            "/payments/{tranId}/cancel-auto-renew",
            post(payments::cancel_auto_renew),
        )
        .route(
            "/payments/{tranId}/downgrade",
            post(payments::downgrade_to_free),
        )
        .route("/payments/{tranId}/fix-plan", post(payments::fix_plan))
        // AI tooling (quota-gated)
        .route("/ai/resume-feedback", post(ai::resume_feedback))
        .route("/ai/interview-questions", post(ai::interview_questions))
        .route("/ai/usage/{feature}", get(ai::usage_status))
        // Uploads carry their own body limits; everything else keeps axum's
        // tight default
        .route(
            "/uploads/resume",
            post(uploads::upload_resume)
                .layer(DefaultBodyLimit::max(uploads::RESUME_BODY_LIMIT)),
        )
        .route(
            "/uploads/image",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::IMAGE_BODY_LIMIT)),
        )
        // Admin
        .route("/admin/users", get(admin::list_users))
        // Authentication (with public allowlist), then body logging outermost
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn(logging_middleware))
}
