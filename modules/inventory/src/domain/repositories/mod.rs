// Repository traits for the inventory core

mod product_repository;

pub use product_repository::{ProductPage, ProductRepository};
