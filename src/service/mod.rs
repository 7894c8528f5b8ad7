pub mod reservation;

pub use reservation::{CancelError, ReservationService, ReserveError};
