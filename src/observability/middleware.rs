use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{future::Future, sync::Arc, time::Instant};
use tracing::{debug, error, info, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;
use crate::models::{RepositoryResult, StockViolation};

/// Middleware for automatic request tracing and metrics collection
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // First hop of X-Forwarded-For, then X-Real-IP
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("unknown")
        .trim()
        .to_string();

    // Route template keeps ids out of metric labels
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span_name = format!("{} {}", method, endpoint);

    let span = tracing::info_span!(
        target: "parkcart_rs::http",
        "http_request",
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        client.address = %client_ip,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %method, path = %endpoint, client_ip = %client_ip, "Processing request");

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.response.status_code", status_code);
        current_span.record("http.response_time_ms", duration_ms);

        let span_context = current_span.context();
        let otel_span = span_context.span();
        if status_code >= 500 {
            otel_span.set_status(opentelemetry::trace::Status::error("HTTP error"));
        } else {
            otel_span.set_status(opentelemetry::trace::Status::Ok);
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                "Request completed with error"
            );
        } else if status_code >= 400 {
            warn!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                "Request rejected"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                "Request completed successfully"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Records timing and outcome of every database call
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a database operation with automatic metrics recording.
    ///
    /// Stock rejections and missing rows are answers from the store, so they
    /// count as successful calls.
    #[instrument(skip_all, fields(
        operation = %operation,
        table = %table,
    ))]
    pub async fn trace_operation<F, T>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let start_time = Instant::now();

        let result = future.await;
        let duration_seconds = start_time.elapsed().as_secs_f64();
        let store_failure = matches!(&result, Err(error) if error.is_store_failure());
        self.metrics
            .record_database_operation(operation, table, !store_failure, duration_seconds);

        match &result {
            Err(error) if store_failure => error!(
                error = %error,
                duration_ms = start_time.elapsed().as_millis(),
                "Database operation failed"
            ),
            Err(error) => debug!(
                error = %error,
                duration_ms = start_time.elapsed().as_millis(),
                "Database operation rejected the write"
            ),
            Ok(_) => {}
        }

        result
    }
}

/// Business-level tracing for cart operations
pub struct CartOperationTracer {
    metrics: Arc<Metrics>,
}

impl CartOperationTracer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a cart operation
    #[instrument(skip_all, fields(
        operation = %operation,
        visitor_id = visitor_id,
    ))]
    pub async fn trace_cart_operation<F, T, E>(
        &self,
        operation: &str,
        visitor_id: Option<i32>,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        match future.await {
            Ok(result) => {
                self.metrics.record_cart_operation(operation, true);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                self.metrics.record_cart_operation(operation, false);

                warn!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation failed"
                );

                Err(error)
            }
        }
    }

    pub fn record_stock_rejection(&self, violation: &StockViolation) {
        self.metrics.record_stock_rejection(violation.reason_code());
    }
}
