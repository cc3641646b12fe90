use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    middleware::Identity,
    models::common::ApiResponse,
    services::storage_service::{
        validate_image_upload, validate_resume_upload, MAX_IMAGE_BYTES, MAX_RESUME_BYTES,
    },
};

/// Headroom for multipart boundaries and part headers on top of the file
/// itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request-body limits for the upload routes. Axum's default caps bodies at
/// 2 MiB, which would abort the multipart read before the size validators
/// ever see the file; these raise the cap to the documented maxima.
pub const RESUME_BODY_LIMIT: usize = MAX_RESUME_BYTES + MULTIPART_OVERHEAD;
pub const IMAGE_BODY_LIMIT: usize = MAX_IMAGE_BYTES + MULTIPART_OVERHEAD;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub url: String,
}

/// POST /api/v1/uploads/resume: PDF only, at most 10MB
#[instrument(skip(state, multipart))]
pub async fn upload_resume(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadData>>> {
    let (content_type, data) = read_file_field(multipart).await?;
    validate_resume_upload(&content_type, data.len())?;

    let url = state
        .storage_service
        .upload_resume(data, identity.user_id)
        .await?;

    Ok(Json(ApiResponse::data(UploadData { url })))
}

/// POST /api/v1/uploads/image: JPEG/PNG/WebP, at most 5MB
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadData>>> {
    let (content_type, data) = read_file_field(multipart).await?;
    let extension = validate_image_upload(&content_type, data.len())?;

    let url = state
        .storage_service
        .upload_image(data, extension, &content_type, identity.user_id)
        .await?;

    Ok(Json(ApiResponse::data(UploadData { url })))
}

/// Pull the `file` part out of the multipart body.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?;
            return Ok((content_type, data.to_vec()));
        }
    }

    Err(ApiError::Validation(
        "Multipart body must contain a 'file' field".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::DefaultBodyLimit,
        http::{header, Request, StatusCode},
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    async fn sink(multipart: Multipart) -> StatusCode {
        match read_file_field(multipart).await {
            Ok(_) => StatusCode::OK,
            Err(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn pdf_multipart_body(file_len: usize) -> (&'static str, Vec<u8>) {
        let boundary = "upload-test-boundary";
        let mut body = Vec::with_capacity(file_len + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"resume.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.resize(body.len() + file_len, b'a');
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (boundary, body)
    }

    fn upload_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
        Request::post("/uploads/resume")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_body_limit_admits_resumes_over_axums_default() {
        let app = Router::new().route(
            "/uploads/resume",
            post(sink).layer(DefaultBodyLimit::max(RESUME_BODY_LIMIT)),
        );

        // 3 MiB sits above axum's 2 MiB default and well under the 10 MiB cap
        let (boundary, body) = pdf_multipart_body(3 * 1024 * 1024);
        let response = app.oneshot(upload_request(boundary, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_limit_admits_a_maximum_size_resume() {
        let app = Router::new().route(
            "/uploads/resume",
            post(sink).layer(DefaultBodyLimit::max(RESUME_BODY_LIMIT)),
        );

        let (boundary, body) = pdf_multipart_body(MAX_RESUME_BYTES);
        let response = app.oneshot(upload_request(boundary, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_default_body_limit_rejects_a_mid_size_resume() {
        // Without the explicit limit the multipart read aborts at 2 MiB;
        // guards against the override being dropped from the router.
        let app = Router::new().route("/uploads/resume", post(sink));

        let (boundary, body) = pdf_multipart_body(3 * 1024 * 1024);
        let response = app.oneshot(upload_request(boundary, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
