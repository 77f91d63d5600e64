use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::ServerConfig;
use crate::handlers::{
    create_cart_router, health_check, metrics_handler, request_validation_middleware,
    security_headers_middleware,
};
use crate::observability::{observability_middleware, Metrics};
use crate::services::CartService;

/// Build the application router with every route and middleware layer
pub fn create_app(
    cart_service: Arc<CartService>,
    metrics: Arc<Metrics>,
    server: &ServerConfig,
) -> Router {
    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(create_cart_router(cart_service))
        // Layers run outer to inner from the bottom up
        .layer(RequestBodyLimitLayer::new(server.max_request_size))
        .layer(middleware::from_fn(request_validation_middleware))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
