use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::error;

use crate::observability::Metrics;

/// `GET /metrics` in the Prometheus text exposition format
pub async fn metrics_handler(
    State(metrics): State<Arc<Metrics>>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let body = metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
    })?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
