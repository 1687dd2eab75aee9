// Domain entities for the inventory core

mod product;
mod reservation;
mod stock;

pub use product::Product;
pub use reservation::Reservation;
pub use stock::Stock;
