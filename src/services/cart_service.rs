use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::models::{
    validate_id, AddOutcome, AddToCartRequest, CartItem, CartItemDetails, NewCartItem,
    RepositoryError, ServiceError, ServiceResult, UpdateCartItemRequest, Validate,
};
use crate::observability::CartOperationTracer;
use crate::repositories::CartRepository;

/// Service for managing visitor shopping carts
pub struct CartService {
    cart_repository: Arc<dyn CartRepository>,
    tracer: Option<CartOperationTracer>,
}

impl CartService {
    /// Create a new CartService
    pub fn new(cart_repository: Arc<dyn CartRepository>) -> Self {
        Self {
            cart_repository,
            tracer: None,
        }
    }

    /// Record cart operation metrics for every call
    pub fn with_tracer(mut self, tracer: CartOperationTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    async fn traced<F, T>(&self, operation: &str, visitor_id: Option<i32>, future: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        let Some(tracer) = &self.tracer else {
            return future.await;
        };

        let result = tracer
            .trace_cart_operation(operation, visitor_id, future)
            .await;
        if let Err(ServiceError::StockViolation(violation)) = &result {
            tracer.record_stock_rejection(violation);
        }
        result
    }

    /// List a visitor's cart, newest rows first
    #[instrument(skip(self))]
    pub async fn list_cart(&self, visitor_id: i32) -> ServiceResult<Vec<CartItemDetails>> {
        let visitor_id = validate_id("visitorId", Some(visitor_id))?;

        self.traced("list_cart", Some(visitor_id), async {
            let items = self.cart_repository.list_by_visitor(visitor_id).await?;
            info!("Cart retrieved with {} items", items.len());
            Ok::<_, ServiceError>(items)
        })
        .await
    }

    /// Add an item to the cart, merging with the row that has the same
    /// commodity and size
    #[instrument(skip(self, request), fields(
        visitor_id = ?request.visitor_id,
        commodity_type_id = ?request.commodity_type_id,
        quantity = request.quantity,
    ))]
    pub async fn add_item(&self, request: AddToCartRequest) -> ServiceResult<AddOutcome> {
        let item = NewCartItem::try_from(request)?;
        let visitor_id = item.visitor_id;

        self.traced("add_item", Some(visitor_id), async {
            let outcome = self.cart_repository.add_or_merge(item).await?;
            info!(
                cart_id = outcome.cart_id(),
                quantity = outcome.quantity(),
                created = outcome.is_created(),
                "Item added to cart"
            );
            Ok::<_, ServiceError>(outcome)
        })
        .await
    }

    /// Set the quantity of an existing cart row
    #[instrument(skip(self, request), fields(quantity = ?request.quantity))]
    pub async fn update_quantity(
        &self,
        cart_id: i32,
        request: UpdateCartItemRequest,
    ) -> ServiceResult<CartItem> {
        let cart_id = validate_id("cartId", Some(cart_id))?;
        request.validate()?;
        let quantity = request.quantity.unwrap_or_default();

        self.traced("update_quantity", None, async {
            let item = self
                .cart_repository
                .set_quantity(cart_id, quantity)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => ServiceError::CartItemNotFound { cart_id },
                    other => other.into(),
                })?;

            info!("Cart item quantity set to {}", item.quantity);
            Ok::<_, ServiceError>(item)
        })
        .await
    }

    /// Remove a single cart row
    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: i32) -> ServiceResult<()> {
        let cart_id = validate_id("cartId", Some(cart_id))?;

        self.traced("remove_item", None, async {
            if !self.cart_repository.delete(cart_id).await? {
                return Err(ServiceError::CartItemNotFound { cart_id });
            }

            info!("Item removed from cart");
            Ok::<_, ServiceError>(())
        })
        .await
    }

    /// Remove every row of a visitor's cart, returning how many were removed
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, visitor_id: i32) -> ServiceResult<u64> {
        let visitor_id = validate_id("visitorId", Some(visitor_id))?;

        self.traced("clear_cart", Some(visitor_id), async {
            let removed = self.cart_repository.delete_by_visitor(visitor_id).await?;
            info!("Cleared {} rows from cart", removed);
            Ok::<_, ServiceError>(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockViolation;
    use crate::observability::Metrics;
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    mock! {
        TestCartRepository {}

        #[async_trait]
        impl CartRepository for TestCartRepository {
            async fn list_by_visitor(&self, visitor_id: i32) -> Result<Vec<CartItemDetails>, RepositoryError>;
            async fn add_or_merge(&self, item: NewCartItem) -> Result<AddOutcome, RepositoryError>;
            async fn set_quantity(&self, cart_id: i32, quantity: i32) -> Result<CartItem, RepositoryError>;
            async fn delete(&self, cart_id: i32) -> Result<bool, RepositoryError>;
            async fn delete_by_visitor(&self, visitor_id: i32) -> Result<u64, RepositoryError>;
        }
    }

    fn add_request(quantity: i32, size: Option<&str>) -> AddToCartRequest {
        AddToCartRequest {
            visitor_id: Some(7),
            commodity_type_id: Some(3),
            quantity,
            size: size.map(str::to_string),
        }
    }

    fn create_test_details() -> CartItemDetails {
        CartItemDetails {
            cart_id: 11,
            commodity_type_id: 3,
            commodity_name: "Park T-Shirt".to_string(),
            base_price: dec!(19.99),
            quantity: 2,
            size: Some("M".to_string()),
            stock_quantity: 5,
            image_url: None,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_cart() {
        let mut mock_repo = MockTestCartRepository::new();
        let details = create_test_details();

        mock_repo
            .expect_list_by_visitor()
            .with(eq(7))
            .times(1)
            .returning(move |_| Ok(vec![details.clone()]));

        let service = CartService::new(Arc::new(mock_repo));
        let items = service.list_cart(7).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].commodity_name, "Park T-Shirt");
    }

    #[tokio::test]
    async fn test_add_item_passes_normalized_size() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_add_or_merge()
            .with(eq(NewCartItem {
                visitor_id: 7,
                commodity_type_id: 3,
                quantity: 2,
                size: None,
            }))
            .times(1)
            .returning(|_| Ok(AddOutcome::Created { cart_id: 11, quantity: 2 }));

        let service = CartService::new(Arc::new(mock_repo));
        let outcome = service.add_item(add_request(2, Some("  "))).await.unwrap();

        assert_eq!(outcome, AddOutcome::Created { cart_id: 11, quantity: 2 });
    }

    #[tokio::test]
    async fn test_add_item_validation_never_reaches_repository() {
        // No expectations: any repository call fails the test
        let service = CartService::new(Arc::new(MockTestCartRepository::new()));

        for request in [
            add_request(0, None),
            add_request(-1, None),
            add_request(1, Some("EXTRA-LARGE-XL")),
            AddToCartRequest {
                visitor_id: None,
                ..add_request(1, None)
            },
        ] {
            match service.add_item(request).await {
                Err(ServiceError::ValidationError { .. }) => {}
                other => panic!("Expected ValidationError, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_add_item_stock_violation_is_reported_verbatim() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo.expect_add_or_merge().times(1).returning(|_| {
            Err(RepositoryError::StockViolation(StockViolation::ExceedsStock {
                requested: 6,
                available: 5,
            }))
        });

        let metrics = Arc::new(Metrics::new().unwrap());
        let service = CartService::new(Arc::new(mock_repo))
            .with_tracer(CartOperationTracer::new(metrics.clone()));
        let error = service.add_item(add_request(6, None)).await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "Requested quantity 6 exceeds stock: only 5 available in stock"
        );
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("reason=\"exceeds_stock\""));
    }

    #[tokio::test]
    async fn test_add_item_unknown_commodity() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_add_or_merge()
            .times(1)
            .returning(|_| Err(RepositoryError::CommodityNotFound { commodity_type_id: 3 }));

        let service = CartService::new(Arc::new(mock_repo));

        assert!(matches!(
            service.add_item(add_request(1, None)).await,
            Err(ServiceError::CommodityNotFound { commodity_type_id: 3 })
        ));
    }

    #[tokio::test]
    async fn test_update_quantity_missing_row() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_set_quantity()
            .with(eq(99), eq(2))
            .times(1)
            .returning(|_, _| Err(RepositoryError::NotFound));

        let service = CartService::new(Arc::new(mock_repo));
        let result = service
            .update_quantity(99, UpdateCartItemRequest { quantity: Some(2) })
            .await;

        match result {
            Err(ServiceError::CartItemNotFound { cart_id }) => assert_eq!(cart_id, 99),
            other => panic!("Expected CartItemNotFound error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_quantity_requires_positive_quantity() {
        let service = CartService::new(Arc::new(MockTestCartRepository::new()));

        for quantity in [None, Some(0), Some(-3)] {
            assert!(matches!(
                service
                    .update_quantity(11, UpdateCartItemRequest { quantity })
                    .await,
                Err(ServiceError::ValidationError { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_update_quantity_success() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_set_quantity()
            .with(eq(11), eq(4))
            .times(1)
            .returning(|cart_id, quantity| {
                Ok(CartItem {
                    cart_id,
                    visitor_id: 7,
                    commodity_type_id: 3,
                    quantity,
                    size: None,
                    added_at: Utc::now(),
                })
            });

        let service = CartService::new(Arc::new(mock_repo));
        let item = service
            .update_quantity(11, UpdateCartItemRequest { quantity: Some(4) })
            .await
            .unwrap();

        assert_eq!(item.quantity, 4);
    }

    #[tokio::test]
    async fn test_remove_item() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo.expect_delete().with(eq(11)).times(1).returning(|_| Ok(true));
        mock_repo.expect_delete().with(eq(12)).times(1).returning(|_| Ok(false));

        let service = CartService::new(Arc::new(mock_repo));

        assert!(service.remove_item(11).await.is_ok());
        assert!(matches!(
            service.remove_item(12).await,
            Err(ServiceError::CartItemNotFound { cart_id: 12 })
        ));
    }

    #[tokio::test]
    async fn test_clear_cart_reports_removed_rows() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_delete_by_visitor()
            .with(eq(7))
            .times(1)
            .returning(|_| Ok(3));

        let service = CartService::new(Arc::new(mock_repo));
        assert_eq!(service.clear_cart(7).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_is_repository_error() {
        let mut mock_repo = MockTestCartRepository::new();

        mock_repo
            .expect_delete_by_visitor()
            .returning(|_| Err(RepositoryError::ConnectionFailed));

        let service = CartService::new(Arc::new(mock_repo));

        assert!(matches!(
            service.clear_cart(7).await,
            Err(ServiceError::Repository {
                source: RepositoryError::ConnectionFailed
            })
        ));
    }

    #[tokio::test]
    async fn test_non_positive_path_ids_are_rejected() {
        let service = CartService::new(Arc::new(MockTestCartRepository::new()));

        assert!(matches!(
            service.list_cart(0).await,
            Err(ServiceError::ValidationError { .. })
        ));
        assert!(matches!(
            service.remove_item(-1).await,
            Err(ServiceError::ValidationError { .. })
        ));
    }
}
