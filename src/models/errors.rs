use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Cart item not found: {cart_id}")]
    CartItemNotFound { cart_id: i32 },

    #[error("Commodity not found: {commodity_type_id}")]
    CommodityNotFound { commodity_type_id: i32 },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{0}")]
    StockViolation(#[from] StockViolation),

    #[error("Repository error: {source}")]
    Repository { source: RepositoryError },
}

/// A write rejected because the resulting cart quantity is not acceptable for
/// the commodity's current stock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockViolation {
    #[error("Quantity must be greater than 0")]
    NonPositiveQuantity { quantity: i32 },

    #[error("Commodity is out of stock")]
    OutOfStock,

    #[error("Requested quantity {requested} exceeds stock: only {available} available in stock")]
    ExceedsStock { requested: i32, available: i32 },
}

impl StockViolation {
    /// Short label used for metrics
    pub fn reason_code(&self) -> &'static str {
        match self {
            StockViolation::NonPositiveQuantity { .. } => "non_positive_quantity",
            StockViolation::OutOfStock => "out_of_stock",
            StockViolation::ExceedsStock { .. } => "exceeds_stock",
        }
    }
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Commodity type {commodity_type_id} does not exist")]
    CommodityNotFound { commodity_type_id: i32 },

    #[error("Stock check failed: {0}")]
    StockViolation(StockViolation),

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,
}

impl RepositoryError {
    /// True when the store itself failed, false for rejections it answered
    pub fn is_store_failure(&self) -> bool {
        !matches!(
            self,
            RepositoryError::NotFound
                | RepositoryError::CommodityNotFound { .. }
                | RepositoryError::StockViolation(_)
        )
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                RepositoryError::ConnectionFailed
            }
            sqlx::Error::Database(db_err) => {
                if db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                    || db_err.is_unique_violation()
                {
                    RepositoryError::ConstraintViolation {
                        message: db_err.message().to_string(),
                    }
                } else {
                    RepositoryError::Database {
                        message: db_err.message().to_string(),
                    }
                }
            }
            other => RepositoryError::Database {
                message: other.to_string(),
            },
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::StockViolation(violation) => ServiceError::StockViolation(violation),
            RepositoryError::CommodityNotFound { commodity_type_id } => {
                ServiceError::CommodityNotFound { commodity_type_id }
            }
            other => ServiceError::Repository { source: other },
        }
    }
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Value out of range: {field}, min={min}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        value: String,
    },

    #[error("Malformed request: {reason}")]
    Malformed { reason: String },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
