use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CreateEvent, EventFilter, EventWithItems, Reservation, UpdateEvent,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event not found")]
    EventNotFound,

    #[error("food item not found")]
    FoodItemNotFound,

    #[error("insufficient remaining quantity")]
    InsufficientQuantity,

    #[error("reservation not found")]
    ReservationNotFound,

    #[error("reservation already cancelled")]
    AlreadyCancelled,

    #[error("caller does not own this record")]
    NotOwner,

    #[error("storage unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl From<sqlx::Error> for StoreError {
    // Absence is always detected with fetch_optional / rows_affected, so a
    // raw driver error here is infrastructure, not a missing row.
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(Box::new(e))
    }
}

/// Result of a committed reservation: the new record plus the
/// post-decrement quantity, so no caller ever has to subtract from a
/// possibly stale copy.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedItem {
    pub reservation: Reservation,
    pub remaining_quantity: i32,
}

/// Event and food-item reads and owner mutations. Reads are never a valid
/// basis for a follow-up unguarded quantity write; quantity mutation
/// happens only inside [`ReservationStore`] and `update_event`'s
/// transaction.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(
        &self,
        creator_id: Uuid,
        req: CreateEvent,
    ) -> Result<EventWithItems, StoreError>;

    /// Owner-only. Replaces fields and the item list in one transaction;
    /// provided quantities reset both total and remaining.
    async fn update_event(
        &self,
        event_id: Uuid,
        caller_id: Uuid,
        req: UpdateEvent,
    ) -> Result<EventWithItems, StoreError>;

    /// Owner-only.
    async fn delete_event(&self, event_id: Uuid, caller_id: Uuid) -> Result<(), StoreError>;

    async fn fetch_event(&self, event_id: Uuid) -> Result<EventWithItems, StoreError>;

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventWithItems>, StoreError>;
}

/// The two transactional inventory operations plus the caller's own
/// history. `reserve_item` and `cancel_reservation` are single methods on
/// purpose: the existence check, quantity check and quantity write commit
/// together or not at all, and no caller can interleave between them.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Atomically decrement the item's remaining quantity by `quantity` if
    /// enough remains, appending the reservation record in the same
    /// transaction.
    async fn reserve_item(
        &self,
        event_id: Uuid,
        food_item_id: Uuid,
        user_id: Uuid,
        quantity: i32,
    ) -> Result<ReservedItem, StoreError>;

    /// Atomically mark the reservation cancelled and restore its quantity
    /// to the food item. Allowed for the reservation's owner or the
    /// event's creator. Returns the item's remaining quantity after the
    /// restore.
    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        caller_id: Uuid,
    ) -> Result<i32, StoreError>;

    /// The caller's reservations, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>, StoreError>;
}
