pub mod event;
pub mod food_item;
pub mod reservation;

pub use event::{
    CreateEvent, Event, EventFilter, EventWithItems, NewFoodItem, UpdateEvent, UpdatedFoodItem,
};
pub use food_item::FoodItem;
pub use reservation::{Reservation, ReservationStatus, ReserveRequest};
