// Repositories module - data access layer

pub mod cart_repository;
pub mod memory_repository;
pub mod schema_manager;

pub use cart_repository::{CartRepository, PostgresCartRepository};
pub use memory_repository::InMemoryCartRepository;
pub use schema_manager::SchemaManager;
