// Infrastructure layer - concrete bindings for the domain and application ports

pub mod locking;
pub mod messaging;
pub mod persistence;
pub mod scheduler;
