use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::models::{
    validate_stock_and_quantity, AddOutcome, CartItem, CartItemDetails, Commodity, NewCartItem,
    RepositoryError, RepositoryResult,
};
use crate::repositories::CartRepository;

#[derive(Debug, Default)]
struct MemoryState {
    commodities: HashMap<i32, Commodity>,
    items: BTreeMap<i32, CartItem>,
    next_cart_id: i32,
}

/// Cart store kept in process memory.
///
/// A single lock guards catalog and rows, so each operation is atomic in the
/// same way a Postgres transaction is.
#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryCartRepository {
    /// Create a store whose catalog holds the given commodities
    pub fn with_commodities(commodities: impl IntoIterator<Item = Commodity>) -> Self {
        let state = MemoryState {
            commodities: commodities
                .into_iter()
                .map(|c| (c.commodity_type_id, c))
                .collect(),
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Total number of cart rows across all visitors
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.items.len()
    }
}

fn stock_of(state: &MemoryState, commodity_type_id: i32) -> RepositoryResult<i32> {
    state
        .commodities
        .get(&commodity_type_id)
        .map(|c| c.stock_quantity)
        .ok_or(RepositoryError::CommodityNotFound { commodity_type_id })
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    #[instrument(skip(self))]
    async fn list_by_visitor(&self, visitor_id: i32) -> RepositoryResult<Vec<CartItemDetails>> {
        let state = self.state.lock().await;

        let mut items: Vec<CartItemDetails> = state
            .items
            .values()
            .filter(|item| item.visitor_id == visitor_id)
            .filter_map(|item| {
                // Rows whose commodity vanished drop out, as with an inner join
                let commodity = state.commodities.get(&item.commodity_type_id)?;
                Some(CartItemDetails {
                    cart_id: item.cart_id,
                    commodity_type_id: item.commodity_type_id,
                    commodity_name: commodity.commodity_name.clone(),
                    base_price: commodity.base_price,
                    quantity: item.quantity,
                    size: item.size.clone(),
                    stock_quantity: commodity.stock_quantity,
                    image_url: commodity.image_url.clone(),
                    added_at: item.added_at,
                })
            })
            .collect();

        items.sort_by(|a, b| {
            b.added_at
                .cmp(&a.added_at)
                .then_with(|| b.cart_id.cmp(&a.cart_id))
        });
        Ok(items)
    }

    #[instrument(skip(self, item), fields(visitor_id = item.visitor_id, commodity_type_id = item.commodity_type_id))]
    async fn add_or_merge(&self, item: NewCartItem) -> RepositoryResult<AddOutcome> {
        let mut state = self.state.lock().await;
        let stock = stock_of(&state, item.commodity_type_id)?;

        let existing = state
            .items
            .values()
            .find(|row| {
                row.visitor_id == item.visitor_id
                    && row.commodity_type_id == item.commodity_type_id
                    && row.size == item.size
            })
            .map(|row| (row.cart_id, row.quantity));

        let current = existing.map(|(_, quantity)| quantity).unwrap_or(0);
        let quantity = validate_stock_and_quantity(current, item.quantity, stock)
            .map_err(RepositoryError::StockViolation)?;

        match existing {
            Some((cart_id, _)) => {
                if let Some(row) = state.items.get_mut(&cart_id) {
                    row.quantity = quantity;
                }
                debug!(cart_id, quantity, "Merged into existing row");
                Ok(AddOutcome::Merged { cart_id, quantity })
            }
            None => {
                state.next_cart_id += 1;
                let cart_id = state.next_cart_id;
                state.items.insert(
                    cart_id,
                    CartItem {
                        cart_id,
                        visitor_id: item.visitor_id,
                        commodity_type_id: item.commodity_type_id,
                        quantity,
                        size: item.size,
                        added_at: Utc::now(),
                    },
                );
                debug!(cart_id, quantity, "Inserted new row");
                Ok(AddOutcome::Created { cart_id, quantity })
            }
        }
    }

    #[instrument(skip(self))]
    async fn set_quantity(&self, cart_id: i32, quantity: i32) -> RepositoryResult<CartItem> {
        let mut state = self.state.lock().await;

        let commodity_type_id = state
            .items
            .get(&cart_id)
            .map(|row| row.commodity_type_id)
            .ok_or(RepositoryError::NotFound)?;
        let stock = stock_of(&state, commodity_type_id)?;

        let quantity = validate_stock_and_quantity(0, quantity, stock)
            .map_err(RepositoryError::StockViolation)?;

        let row = state
            .items
            .get_mut(&cart_id)
            .ok_or(RepositoryError::NotFound)?;
        row.quantity = quantity;
        Ok(row.clone())
    }

    #[instrument(skip(self))]
    async fn delete(&self, cart_id: i32) -> RepositoryResult<bool> {
        Ok(self.state.lock().await.items.remove(&cart_id).is_some())
    }

    #[instrument(skip(self))]
    async fn delete_by_visitor(&self, visitor_id: i32) -> RepositoryResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|_, row| row.visitor_id != visitor_id);
        Ok((before - state.items.len()) as u64)
    }
}
