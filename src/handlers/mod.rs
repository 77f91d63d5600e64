pub mod api;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use api::{create_cart_router, CartApiState};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use middleware::{request_validation_middleware, security_headers_middleware};
