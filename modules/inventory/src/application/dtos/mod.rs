// DTOs for the application layer

pub mod commands;
pub mod responses;
