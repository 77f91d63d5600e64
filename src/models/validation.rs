use super::{
    AddToCartRequest, NewCartItem, StockViolation, UpdateCartItemRequest, ValidationError,
    ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_SIZE_LENGTH: usize = 10;
pub const MIN_CART_QUANTITY: i32 = 1;

impl Validate for UpdateCartItemRequest {
    fn validate(&self) -> ValidationResult<()> {
        let quantity = self.quantity.ok_or_else(|| ValidationError::RequiredField {
            field: "quantity".to_string(),
        })?;
        validate_cart_quantity(quantity)
    }
}

impl TryFrom<AddToCartRequest> for NewCartItem {
    type Error = ValidationError;

    fn try_from(request: AddToCartRequest) -> ValidationResult<Self> {
        let visitor_id = validate_id("visitorId", request.visitor_id)?;
        let commodity_type_id = validate_id("commodityTypeId", request.commodity_type_id)?;
        validate_cart_quantity(request.quantity)?;
        let size = normalize_size(request.size.as_deref())?;

        Ok(NewCartItem {
            visitor_id,
            commodity_type_id,
            quantity: request.quantity,
            size,
        })
    }
}

/// Validate a required, positive identifier and return it
pub fn validate_id(field: &str, id: Option<i32>) -> ValidationResult<i32> {
    let id = id.ok_or_else(|| ValidationError::RequiredField {
        field: field.to_string(),
    })?;

    if id < 1 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "1".to_string(),
            value: id.to_string(),
        });
    }

    Ok(id)
}

/// Validate a requested cart quantity
pub fn validate_cart_quantity(quantity: i32) -> ValidationResult<()> {
    if quantity < MIN_CART_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: MIN_CART_QUANTITY.to_string(),
            value: quantity.to_string(),
        });
    }
    Ok(())
}

/// Bring a size into its canonical form.
///
/// Surrounding whitespace is dropped and an absent, empty or blank size all
/// become `None`, so they identify the same cart row.
pub fn normalize_size(size: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(trimmed) = size.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let length = trimmed.chars().count();
    if length > MAX_SIZE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "size".to_string(),
            max_length: MAX_SIZE_LENGTH,
            actual_length: length,
        });
    }

    Ok(Some(trimmed.to_string()))
}

/// Stock rule for cart writes.
///
/// `current` is the quantity already in the row (0 for a new row or an absolute
/// set), `requested` the amount being added. Returns the quantity to persist.
pub fn validate_stock_and_quantity(
    current: i32,
    requested: i32,
    stock_available: i32,
) -> Result<i32, StockViolation> {
    let Some(resulting) = current.checked_add(requested) else {
        return Err(StockViolation::ExceedsStock {
            requested: i32::MAX,
            available: stock_available.max(0),
        });
    };

    if resulting <= 0 {
        return Err(StockViolation::NonPositiveQuantity {
            quantity: resulting,
        });
    }

    if stock_available <= 0 {
        return Err(StockViolation::OutOfStock);
    }

    if resulting > stock_available {
        return Err(StockViolation::ExceedsStock {
            requested: resulting,
            available: stock_available,
        });
    }

    Ok(resulting)
}
