// Persistence bindings

mod in_memory_product_repository;
mod pg_processed_event_store;
mod pg_product_repository;

pub use in_memory_product_repository::InMemoryProductRepository;
pub use pg_processed_event_store::PgProcessedEventStore;
pub use pg_product_repository::PgProductRepository;
