use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A persisted row of a visitor's shopping cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub cart_id: i32,
    pub visitor_id: i32,
    pub commodity_type_id: i32,
    pub quantity: i32,
    pub size: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Cart row joined with the commodity display fields, as returned by List
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDetails {
    pub cart_id: i32,
    pub commodity_type_id: i32,
    pub commodity_name: String,
    pub base_price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Validated add command handed to the repository.
///
/// `size` is already in canonical form: trimmed, with empty values mapped to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub visitor_id: i32,
    pub commodity_type_id: i32,
    pub quantity: i32,
    pub size: Option<String>,
}

/// What an add did to the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new row was inserted
    Created { cart_id: i32, quantity: i32 },
    /// The request was folded into an existing row
    Merged { cart_id: i32, quantity: i32 },
}

impl AddOutcome {
    pub fn cart_id(&self) -> i32 {
        match self {
            AddOutcome::Created { cart_id, .. } | AddOutcome::Merged { cart_id, .. } => *cart_id,
        }
    }

    /// Quantity of the row after the write
    pub fn quantity(&self) -> i32 {
        match self {
            AddOutcome::Created { quantity, .. } | AddOutcome::Merged { quantity, .. } => {
                *quantity
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, AddOutcome::Created { .. })
    }
}

fn default_quantity() -> i32 {
    1
}

/// Request body for `POST /api/cart/add`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub visitor_id: Option<i32>,
    pub commodity_type_id: Option<i32>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
}

/// Request body for `PUT /api/cart/{cartId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: Option<i32>,
}

/// Whether an add created a row or merged into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddStatus {
    Created,
    Merged,
}

/// Response body for a successful add
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartResponse {
    pub message: String,
    pub cart_id: i32,
    pub status: AddStatus,
    pub quantity: i32,
}

/// Response body for a successful quantity update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemResponse {
    pub message: String,
    pub cart_id: i32,
    pub quantity: i32,
}

/// Response body for a successful clear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCartResponse {
    pub message: String,
    pub removed: u64,
}

/// Plain message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl From<AddOutcome> for AddToCartResponse {
    fn from(outcome: AddOutcome) -> Self {
        let (message, status) = match outcome {
            AddOutcome::Created { .. } => ("Added to cart successfully", AddStatus::Created),
            AddOutcome::Merged { .. } => ("Cart updated successfully", AddStatus::Merged),
        };
        Self {
            message: message.to_string(),
            cart_id: outcome.cart_id(),
            status,
            quantity: outcome.quantity(),
        }
    }
}

impl From<CartItem> for UpdateCartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            message: "Cart updated successfully".to_string(),
            cart_id: item.cart_id,
            quantity: item.quantity,
        }
    }
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
