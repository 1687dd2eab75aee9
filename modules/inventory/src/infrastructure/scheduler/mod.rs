// Background scheduling

mod reservation_sweeper;

pub use reservation_sweeper::ReservationSweeper;
