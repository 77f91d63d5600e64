use sqlx::PgPool;
use tracing::{info, instrument};

use crate::models::RepositoryResult;
use crate::repositories::cart_repository::{CART_TABLE, COMMODITY_TABLE};

const CREATE_COMMODITY_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS commodity_type (
    commodity_type_id SERIAL PRIMARY KEY,
    commodity_name VARCHAR(100) NOT NULL,
    base_price NUMERIC(10, 2) NOT NULL,
    stock_quantity INTEGER NOT NULL DEFAULT 0,
    image_url TEXT
)
"#;

const CREATE_CART_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS shopping_cart (
    cart_id SERIAL PRIMARY KEY,
    visitor_id INTEGER NOT NULL,
    commodity_type_id INTEGER NOT NULL REFERENCES commodity_type (commodity_type_id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    size VARCHAR(10),
    added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_CART_VISITOR_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS shopping_cart_visitor_idx
    ON shopping_cart (visitor_id, commodity_type_id)
"#;

const TABLE_EXISTS_SQL: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_name = $1
)
"#;

/// Creates the cart schema in a development database.
///
/// Production databases are migrated out of band; this only runs when
/// `PARKCART_ENSURE_SCHEMA` is set.
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create both tables and the visitor index if they are missing
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> RepositoryResult<()> {
        info!("Ensuring cart schema");

        // The cart table references the commodity table, so order matters
        for statement in [
            CREATE_COMMODITY_TABLE_SQL,
            CREATE_CART_TABLE_SQL,
            CREATE_CART_VISITOR_INDEX_SQL,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!(
            "Tables {} and {} are in place",
            COMMODITY_TABLE, CART_TABLE
        );
        Ok(())
    }

    /// Check if a table exists in the current schema
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        let exists: bool = sqlx::query_scalar(TABLE_EXISTS_SQL)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

        info!(exists, "Checked table existence");
        Ok(exists)
    }

    /// Check that both cart tables exist
    pub async fn schema_ready(&self) -> RepositoryResult<bool> {
        Ok(self.table_exists(COMMODITY_TABLE).await? && self.table_exists(CART_TABLE).await?)
    }
}
