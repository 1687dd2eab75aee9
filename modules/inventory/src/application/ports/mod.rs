// Outbound ports owned by the application layer

mod lock_manager;

pub use lock_manager::{product_lock_key, with_lock, LockError, LockManager, LockToken};
