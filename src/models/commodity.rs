use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog entry for a sellable commodity type. Read-only for the cart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commodity {
    pub commodity_type_id: i32,
    pub commodity_name: String,
    pub base_price: Decimal,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

impl Commodity {
    pub fn new(
        commodity_type_id: i32,
        commodity_name: impl Into<String>,
        base_price: Decimal,
        stock_quantity: i32,
    ) -> Self {
        Self {
            commodity_type_id,
            commodity_name: commodity_name.into(),
            base_price,
            stock_quantity,
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}
