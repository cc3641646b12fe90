use crate::error::ApiError;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

const BODY_READ_LIMIT: usize = 1024 * 1024;
const BODY_LOG_LIMIT: usize = 2000;

/// Request bodies on these prefixes carry passwords or reset tokens and are
/// never logged.
const REDACTED_PREFIXES: &[&str] = &["/api/v1/auth"];

/// Logs every request and response with a correlation id, latency and a
/// truncated body. Credential-bearing bodies are redacted and file uploads
/// are passed through without buffering.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let path = uri.path().to_string();
    let redact_body = REDACTED_PREFIXES.iter().any(|p| path.starts_with(p));
    let is_upload = request
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false);

    let request = if is_upload {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body = "[multipart upload]",
            "→ Request"
        );
        request
    } else {
        let (parts, body) = request.into_parts();
        let bytes = match to_bytes(body, BODY_READ_LIMIT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
                // Same envelope as every other client-facing error
                return ApiError::Validation("Request body too large or unreadable".to_string())
                    .into_response();
            }
        };

        let logged = if redact_body {
            "[redacted]".to_string()
        } else {
            truncate_body(&String::from_utf8_lossy(&bytes), BODY_LOG_LIMIT)
        };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body = %logged,
            "→ Request"
        );

        Request::from_parts(parts, Body::from(bytes))
    };

    let response = next.run(request).await;

    let status = response.status();
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, BODY_READ_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            Bytes::new()
        }
    };

    let latency = start.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        body = %truncate_body(&String::from_utf8_lossy(&bytes), BODY_LOG_LIMIT),
        "← Response"
    );

    Response::from_parts(parts, Body::from(bytes))
}

fn truncate_body(body: &str, max_len: usize) -> String {
    let body = body.trim();
    if body.len() <= max_len {
        body.to_string()
    } else {
        format!(
            "{}...[truncated, {} bytes total]",
            &body[..max_len],
            body.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, Request, StatusCode},
        middleware::from_fn,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn test_truncate_body_marks_overflow() {
        assert_eq!(truncate_body("short", 10), "short");
        let long = "x".repeat(50);
        let out = truncate_body(&long, 10);
        assert!(out.starts_with("xxxxxxxxxx..."));
        assert!(out.contains("50 bytes total"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_with_the_json_envelope() {
        async fn handler() -> &'static str {
            "ok"
        }
        let app = Router::new()
            .route("/echo", post(handler))
            .layer(from_fn(logging_middleware));

        let oversized = "x".repeat(BODY_READ_LIMIT + 1);
        let response = app
            .oneshot(
                Request::post("/echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(oversized))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }
}
