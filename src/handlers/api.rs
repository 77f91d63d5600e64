use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    AddToCartRequest, AddToCartResponse, CartItemDetails, ClearCartResponse, MessageResponse,
    RepositoryError, ServiceError, UpdateCartItemRequest, UpdateCartItemResponse, ValidationError,
};
use crate::services::CartService;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for the cart endpoints
#[derive(Clone)]
pub struct CartApiState {
    pub cart_service: Arc<CartService>,
}

/// Create the cart API router
pub fn create_cart_router(cart_service: Arc<CartService>) -> Router {
    let state = CartApiState { cart_service };

    Router::new()
        .route("/api/cart/add", post(add_to_cart))
        .route("/api/cart/visitor/:visitor_id", delete(clear_cart))
        .route(
            "/api/cart/:id",
            get(list_cart).put(update_cart_item).delete(remove_cart_item),
        )
        .with_state(state)
}

/// List a visitor's cart items with commodity details
#[instrument(name = "list_cart", skip_all)]
pub async fn list_cart(
    State(state): State<CartApiState>,
    visitor_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<Vec<CartItemDetails>>, ApiError> {
    let Path(visitor_id) = visitor_id.map_err(path_rejection_to_response)?;
    crate::info_with_trace!("Listing cart for visitor: {}", visitor_id);

    match state.cart_service.list_cart(visitor_id).await {
        Ok(items) => Ok(Json(items)),
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Add an item to the cart, or merge into the matching row
#[instrument(name = "add_to_cart", skip_all)]
pub async fn add_to_cart(
    State(state): State<CartApiState>,
    request: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddToCartResponse>), ApiError> {
    let Json(request) = request.map_err(json_rejection_to_response)?;

    match state.cart_service.add_item(request).await {
        Ok(outcome) => {
            let status = if outcome.is_created() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            crate::info_with_trace!(
                "Cart row {} now holds {}",
                outcome.cart_id(),
                outcome.quantity()
            );
            Ok((status, Json(AddToCartResponse::from(outcome))))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Set the quantity of an existing cart item
#[instrument(name = "update_cart_item", skip_all)]
pub async fn update_cart_item(
    State(state): State<CartApiState>,
    cart_id: Result<Path<i32>, PathRejection>,
    request: Result<Json<UpdateCartItemRequest>, JsonRejection>,
) -> Result<Json<UpdateCartItemResponse>, ApiError> {
    let Path(cart_id) = cart_id.map_err(path_rejection_to_response)?;
    let Json(request) = request.map_err(json_rejection_to_response)?;

    match state.cart_service.update_quantity(cart_id, request).await {
        Ok(item) => Ok(Json(UpdateCartItemResponse::from(item))),
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Remove one item from the cart
#[instrument(name = "remove_cart_item", skip_all)]
pub async fn remove_cart_item(
    State(state): State<CartApiState>,
    cart_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(cart_id) = cart_id.map_err(path_rejection_to_response)?;

    match state.cart_service.remove_item(cart_id).await {
        Ok(()) => {
            crate::info_with_trace!("Removed cart item: {}", cart_id);
            Ok(Json(MessageResponse::new("Item removed from cart")))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Clear every item of a visitor's cart
#[instrument(name = "clear_cart", skip_all)]
pub async fn clear_cart(
    State(state): State<CartApiState>,
    visitor_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let Path(visitor_id) = visitor_id.map_err(path_rejection_to_response)?;

    match state.cart_service.clear_cart(visitor_id).await {
        Ok(removed) => Ok(Json(ClearCartResponse {
            message: "Cart cleared".to_string(),
            removed,
        })),
        Err(err) => Err(service_error_to_response(err)),
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn error_body(status: StatusCode, error: &str, message: String) -> ApiError {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

fn json_rejection_to_response(rejection: JsonRejection) -> ApiError {
    crate::warn_with_trace!("Rejected request body: {}", rejection.body_text());
    malformed_request(rejection.body_text())
}

fn path_rejection_to_response(rejection: PathRejection) -> ApiError {
    crate::warn_with_trace!("Rejected path parameter: {}", rejection.body_text());
    malformed_request(rejection.body_text())
}

fn malformed_request(reason: String) -> ApiError {
    let error = ValidationError::Malformed { reason };
    error_body(StatusCode::BAD_REQUEST, "Validation failed", error.to_string())
}

/// Convert ServiceError to HTTP response
fn service_error_to_response(err: ServiceError) -> ApiError {
    let (status, error, message) = match &err {
        ServiceError::ValidationError { .. } => {
            (StatusCode::BAD_REQUEST, "Validation failed", err.to_string())
        }
        ServiceError::StockViolation(violation) => {
            (StatusCode::BAD_REQUEST, "Stock violation", violation.to_string())
        }
        ServiceError::CartItemNotFound { .. } | ServiceError::CommodityNotFound { .. } => {
            (StatusCode::NOT_FOUND, "Not found", err.to_string())
        }
        ServiceError::Repository { source } => match source {
            RepositoryError::ConnectionFailed | RepositoryError::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable",
                "Database unavailable".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "Internal server error".to_string(),
            ),
        },
    };

    if status.is_server_error() {
        crate::error_with_trace!("Cart request failed: {}", err);
    } else {
        crate::warn_with_trace!("Cart request rejected: {}", err);
    }

    error_body(status, error, message)
}
