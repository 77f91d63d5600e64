use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use tracing::{info, instrument, warn, Instrument};

use crate::models::{
    validate_stock_and_quantity, AddOutcome, CartItem, CartItemDetails, NewCartItem,
    RepositoryError, RepositoryResult,
};
use crate::observability::DatabaseTracingMiddleware;

pub(crate) const CART_TABLE: &str = "shopping_cart";
pub(crate) const COMMODITY_TABLE: &str = "commodity_type";

const LIST_BY_VISITOR_SQL: &str = r#"
SELECT c.cart_id, c.commodity_type_id, t.commodity_name, t.base_price, c.quantity,
       c.size, t.stock_quantity, t.image_url, c.added_at
FROM shopping_cart c
JOIN commodity_type t ON t.commodity_type_id = c.commodity_type_id
WHERE c.visitor_id = $1
ORDER BY c.added_at DESC, c.cart_id DESC
"#;

const LOCK_STOCK_SQL: &str =
    "SELECT stock_quantity FROM commodity_type WHERE commodity_type_id = $1 FOR UPDATE";

const FIND_MERGE_TARGET_SQL: &str = r#"
SELECT cart_id, quantity
FROM shopping_cart
WHERE visitor_id = $1 AND commodity_type_id = $2 AND size IS NOT DISTINCT FROM $3
ORDER BY cart_id
LIMIT 1
FOR UPDATE
"#;

const INSERT_SQL: &str = r#"
INSERT INTO shopping_cart (visitor_id, commodity_type_id, quantity, size, added_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING cart_id
"#;

const MERGE_SQL: &str = "UPDATE shopping_cart SET quantity = $1 WHERE cart_id = $2";

const SET_QUANTITY_SQL: &str = r#"
UPDATE shopping_cart SET quantity = $1 WHERE cart_id = $2
RETURNING cart_id, visitor_id, commodity_type_id, quantity, size, added_at
"#;

/// Trait defining the interface for cart data access operations.
///
/// Every write runs the stock rule against the commodity's current stock inside
/// the same atomic unit as the write itself.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// All rows of a visitor joined with commodity details, newest first
    async fn list_by_visitor(&self, visitor_id: i32) -> RepositoryResult<Vec<CartItemDetails>>;

    /// Insert a new row, or add to the quantity of the row with the same
    /// (visitor, commodity, size) key
    async fn add_or_merge(&self, item: NewCartItem) -> RepositoryResult<AddOutcome>;

    /// Set the absolute quantity of a row. `NotFound` when the row is absent.
    async fn set_quantity(&self, cart_id: i32, quantity: i32) -> RepositoryResult<CartItem>;

    /// Delete a single row, returning whether it existed
    async fn delete(&self, cart_id: i32) -> RepositoryResult<bool>;

    /// Delete every row of a visitor, returning how many were removed
    async fn delete_by_visitor(&self, visitor_id: i32) -> RepositoryResult<u64>;
}

/// PostgreSQL implementation of the CartRepository trait
pub struct PostgresCartRepository {
    pool: PgPool,
    db_tracing: Option<DatabaseTracingMiddleware>,
}

impl PostgresCartRepository {
    /// Create a new Postgres cart repository
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            db_tracing: None,
        }
    }

    /// Record database operation metrics for every call
    pub fn with_tracing(mut self, db_tracing: DatabaseTracingMiddleware) -> Self {
        self.db_tracing = Some(db_tracing);
        self
    }

    /// Create a database client span with OpenTelemetry semantic attributes
    fn create_postgres_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "PostgreSQL",
            "otel.kind" = "client",
            "otel.name" = format!("{} {}", operation, CART_TABLE),
            "db.system" = "postgresql",
            "db.operation" = operation,
            "db.sql.table" = CART_TABLE,
            "component" = "sqlx",
        )
    }

    async fn run<F, T>(&self, operation: &str, future: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let span = self.create_postgres_span(operation);
        match &self.db_tracing {
            Some(db_tracing) => {
                db_tracing
                    .trace_operation(operation, CART_TABLE, future)
                    .instrument(span)
                    .await
            }
            None => future.instrument(span).await,
        }
    }

    async fn lock_stock(
        tx: &mut Transaction<'_, Postgres>,
        commodity_type_id: i32,
    ) -> RepositoryResult<i32> {
        let stock: Option<i32> = sqlx::query_scalar(LOCK_STOCK_SQL)
            .bind(commodity_type_id)
            .fetch_optional(&mut **tx)
            .await?;
        stock.ok_or(RepositoryError::CommodityNotFound { commodity_type_id })
    }

    async fn add_or_merge_tx(&self, item: &NewCartItem) -> RepositoryResult<AddOutcome> {
        let mut tx = self.pool.begin().await?;

        // Locking the commodity row serializes every cart write for it
        let stock = Self::lock_stock(&mut tx, item.commodity_type_id).await?;

        let existing: Option<(i32, i32)> = sqlx::query_as(FIND_MERGE_TARGET_SQL)
            .bind(item.visitor_id)
            .bind(item.commodity_type_id)
            .bind(item.size.as_deref())
            .fetch_optional(&mut *tx)
            .await?;

        let current = existing.map(|(_, quantity)| quantity).unwrap_or(0);
        let quantity = validate_stock_and_quantity(current, item.quantity, stock).map_err(
            |violation| {
                warn!(reason = %violation, "Stock check rejected cart write");
                RepositoryError::StockViolation(violation)
            },
        )?;

        let outcome = match existing {
            Some((cart_id, _)) => {
                sqlx::query(MERGE_SQL)
                    .bind(quantity)
                    .bind(cart_id)
                    .execute(&mut *tx)
                    .await?;
                AddOutcome::Merged { cart_id, quantity }
            }
            None => {
                let cart_id: i32 = sqlx::query_scalar(INSERT_SQL)
                    .bind(item.visitor_id)
                    .bind(item.commodity_type_id)
                    .bind(quantity)
                    .bind(item.size.as_deref())
                    .bind(Utc::now())
                    .fetch_one(&mut *tx)
                    .await?;
                AddOutcome::Created { cart_id, quantity }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_quantity_tx(&self, cart_id: i32, quantity: i32) -> RepositoryResult<CartItem> {
        let mut tx = self.pool.begin().await?;

        // Same lock order as add_or_merge: commodity first, then the cart row
        let commodity_type_id: Option<i32> =
            sqlx::query_scalar("SELECT commodity_type_id FROM shopping_cart WHERE cart_id = $1")
                .bind(cart_id)
                .fetch_optional(&mut *tx)
                .await?;
        let commodity_type_id = commodity_type_id.ok_or(RepositoryError::NotFound)?;

        let stock = Self::lock_stock(&mut tx, commodity_type_id).await?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT cart_id FROM shopping_cart WHERE cart_id = $1 FOR UPDATE")
                .bind(cart_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let quantity = validate_stock_and_quantity(0, quantity, stock)
            .map_err(RepositoryError::StockViolation)?;

        let item = sqlx::query_as::<_, CartItem>(SET_QUANTITY_SQL)
            .bind(quantity)
            .bind(cart_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(item)
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    #[instrument(skip(self), fields(table = CART_TABLE, visitor_id = visitor_id))]
    async fn list_by_visitor(&self, visitor_id: i32) -> RepositoryResult<Vec<CartItemDetails>> {
        info!("Listing cart rows for visitor");

        let items = self
            .run("SELECT", async {
                sqlx::query_as::<_, CartItemDetails>(LIST_BY_VISITOR_SQL)
                    .bind(visitor_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(RepositoryError::from)
            })
            .await?;

        info!("Found {} cart rows", items.len());
        Ok(items)
    }

    #[instrument(skip(self, item), fields(
        table = CART_TABLE,
        visitor_id = item.visitor_id,
        commodity_type_id = item.commodity_type_id,
        quantity = item.quantity,
    ))]
    async fn add_or_merge(&self, item: NewCartItem) -> RepositoryResult<AddOutcome> {
        info!("Adding item to cart");

        let outcome = self.run("UPSERT", self.add_or_merge_tx(&item)).await?;

        info!(cart_id = outcome.cart_id(), "Cart write committed");
        Ok(outcome)
    }

    #[instrument(skip(self), fields(table = CART_TABLE, cart_id = cart_id, quantity = quantity))]
    async fn set_quantity(&self, cart_id: i32, quantity: i32) -> RepositoryResult<CartItem> {
        info!("Setting cart item quantity");

        self.run("UPDATE", self.set_quantity_tx(cart_id, quantity))
            .await
    }

    #[instrument(skip(self), fields(table = CART_TABLE, cart_id = cart_id))]
    async fn delete(&self, cart_id: i32) -> RepositoryResult<bool> {
        info!("Deleting cart item");

        let result = self
            .run("DELETE", async {
                sqlx::query("DELETE FROM shopping_cart WHERE cart_id = $1")
                    .bind(cart_id)
                    .execute(&self.pool)
                    .await
                    .map_err(RepositoryError::from)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(table = CART_TABLE, visitor_id = visitor_id))]
    async fn delete_by_visitor(&self, visitor_id: i32) -> RepositoryResult<u64> {
        info!("Clearing cart rows for visitor");

        let result = self
            .run("DELETE", async {
                sqlx::query("DELETE FROM shopping_cart WHERE visitor_id = $1")
                    .bind(visitor_id)
                    .execute(&self.pool)
                    .await
                    .map_err(RepositoryError::from)
            })
            .await?;

        info!("Removed {} cart rows", result.rows_affected());
        Ok(result.rows_affected())
    }
}
