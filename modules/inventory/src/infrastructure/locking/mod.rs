// Lock manager bindings

mod in_memory_lock_manager;
mod redis_lock_manager;

pub use in_memory_lock_manager::InMemoryLockManager;
pub use redis_lock_manager::RedisLockManager;
