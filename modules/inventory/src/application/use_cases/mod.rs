// Use cases - one struct per business operation

mod adjust_stock_use_case;
mod batch_reserve_use_case;
mod deduct_stock_use_case;
mod expire_reservations_use_case;
mod get_product_stock_use_case;
mod release_order_use_case;
mod release_reservation_use_case;
mod reserve_stock_use_case;
mod support;

pub use adjust_stock_use_case::AdjustStockUseCase;
pub use batch_reserve_use_case::BatchReserveUseCase;
pub use deduct_stock_use_case::DeductStockUseCase;
pub use expire_reservations_use_case::ExpireReservationsUseCase;
pub use get_product_stock_use_case::GetProductStockUseCase;
pub use release_order_use_case::ReleaseOrderUseCase;
pub use release_reservation_use_case::ReleaseReservationUseCase;
pub use reserve_stock_use_case::ReserveStockUseCase;
