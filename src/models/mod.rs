// Re-export all model types
pub use self::cart::*;
pub use self::commodity::*;
pub use self::errors::*;
pub use self::validation::*;

mod cart;
mod commodity;
mod errors;
mod validation;
