use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use serde_json::{json, Value};
use tracing::warn;

/// Request validation middleware
pub async fn request_validation_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    validate_content_type(&request)?;

    Ok(next.run(request).await)
}

/// Bodies of POST and PUT requests must be JSON
fn validate_content_type(request: &Request<Body>) -> Result<(), (StatusCode, Json<Value>)> {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return Ok(());
    }

    match request.headers().get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type_str = content_type.to_str().unwrap_or("");

            if !content_type_str.starts_with("application/json") {
                warn!("Invalid content type: {}", content_type_str);
                return Err((
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    Json(json!({
                        "error": "Unsupported media type",
                        "message": "Content-Type must be application/json",
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                    })),
                ));
            }
            Ok(())
        }
        None => {
            warn!("Missing content type header");
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Validation failed",
                    "message": "Content-Type header is required for requests with body",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            ))
        }
    }
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/echo", post(|| async { "ok" }).delete(|| async { "gone" }))
            .layer(middleware::from_fn(request_validation_middleware))
            .layer(middleware::from_fn(security_headers_middleware))
    }

    #[tokio::test]
    async fn test_json_body_is_accepted() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header("content-type", "application/json; charset=utf-8")
            .body(Body::from("{}"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header("content-type", "text/plain")
            .body(Body::from("hello"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .body(Body::from("{}"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_without_body_passes() {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/echo")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}
