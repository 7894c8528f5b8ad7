//! The one authoritative reservation flow. Every call site goes through
//! [`ReservationService`]; nothing else in the crate reads a quantity and
//! writes a new one based on that read.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::{Reservation, ReserveRequest};
use crate::store::{BoxError, ReservationStore, ReservedItem, StoreError};
use crate::utils::error::AppError;

/// Terminal outcomes of a reservation attempt, per request. `Transient` is
/// the only retryable one and guarantees no state change happened.
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("caller is not authenticated")]
    NotAuthenticated,

    #[error("requested quantity {0} is not positive")]
    InvalidQuantity(i32),

    #[error("event does not exist")]
    EventNotFound,

    #[error("food item does not exist in this event")]
    FoodItemNotFound,

    #[error("not enough remaining quantity")]
    SoldOut,

    #[error("storage failure, safe to retry")]
    Transient(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("caller is not authenticated")]
    NotAuthenticated,

    #[error("reservation does not exist")]
    ReservationNotFound,

    #[error("caller may not cancel this reservation")]
    NotAuthorized,

    #[error("reservation is already cancelled")]
    AlreadyCancelled,

    #[error("storage failure, safe to retry")]
    Transient(#[source] BoxError),
}

pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Reserves `req.quantity` (default 1) of a food item for the caller.
    ///
    /// Anonymous callers and non-positive quantities are rejected before
    /// any store access. The availability check and decrement are a single
    /// atomic store operation, so concurrent callers can race but never
    /// oversell: whichever commit lands first wins the quantity that was
    /// available at that instant.
    pub async fn reserve(
        &self,
        caller: Caller,
        event_id: Uuid,
        req: ReserveRequest,
    ) -> Result<ReservedItem, ReserveError> {
        let user_id = caller.user_id().ok_or(ReserveError::NotAuthenticated)?;

        let quantity = req.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(ReserveError::InvalidQuantity(quantity));
        }

        let reserved = self
            .store
            .reserve_item(event_id, req.food_item_id, user_id, quantity)
            .await
            .map_err(|e| match e {
                StoreError::EventNotFound => ReserveError::EventNotFound,
                StoreError::FoodItemNotFound => ReserveError::FoodItemNotFound,
                StoreError::InsufficientQuantity => ReserveError::SoldOut,
                StoreError::Unavailable(source) => ReserveError::Transient(source),
                other => ReserveError::Transient(Box::new(other)),
            })?;

        info!(
            reservation_id = %reserved.reservation.id,
            %event_id,
            food_item_id = %req.food_item_id,
            quantity,
            remaining = reserved.remaining_quantity,
            "reservation confirmed"
        );
        Ok(reserved)
    }

    /// Cancels a reservation owned by the caller (or by the event's
    /// creator), restoring its quantity to the food item in the same
    /// transaction. Returns the item's remaining quantity after the
    /// restore.
    pub async fn cancel(
        &self,
        caller: Caller,
        reservation_id: Uuid,
    ) -> Result<i32, CancelError> {
        let user_id = caller.user_id().ok_or(CancelError::NotAuthenticated)?;

        let remaining = self
            .store
            .cancel_reservation(reservation_id, user_id)
            .await
            .map_err(|e| match e {
                StoreError::ReservationNotFound => CancelError::ReservationNotFound,
                StoreError::NotOwner => CancelError::NotAuthorized,
                StoreError::AlreadyCancelled => CancelError::AlreadyCancelled,
                StoreError::Unavailable(source) => CancelError::Transient(source),
                other => CancelError::Transient(Box::new(other)),
            })?;

        info!(%reservation_id, remaining, "reservation cancelled");
        Ok(remaining)
    }

    /// The caller's reservation history, newest first. Only
    /// `NotAuthenticated` and `Transient` can occur here.
    pub async fn reservations_for(&self, caller: Caller) -> Result<Vec<Reservation>, ReserveError> {
        let user_id = caller.user_id().ok_or(ReserveError::NotAuthenticated)?;
        self.store.list_for_user(user_id).await.map_err(|e| match e {
            StoreError::Unavailable(source) => ReserveError::Transient(source),
            other => ReserveError::Transient(Box::new(other)),
        })
    }
}

impl From<ReserveError> for AppError {
    fn from(e: ReserveError) -> Self {
        match e {
            ReserveError::NotAuthenticated => {
                AppError::AuthError("Sign in to reserve food".to_string())
            }
            ReserveError::InvalidQuantity(q) => {
                AppError::ValidationError(format!("Quantity must be at least 1, got {q}"))
            }
            ReserveError::EventNotFound => {
                AppError::EventNotFound("This event no longer exists".to_string())
            }
            ReserveError::FoodItemNotFound => {
                AppError::FoodItemNotFound("This food item is not part of the event".to_string())
            }
            ReserveError::SoldOut => {
                AppError::SoldOut("Not enough of this item is left to reserve".to_string())
            }
            ReserveError::Transient(source) => {
                warn!(error = %source, "transient reservation failure");
                AppError::StoreUnavailable(source.to_string())
            }
        }
    }
}

impl From<CancelError> for AppError {
    fn from(e: CancelError) -> Self {
        match e {
            CancelError::NotAuthenticated => {
                AppError::AuthError("Sign in to manage reservations".to_string())
            }
            CancelError::ReservationNotFound => {
                AppError::ReservationNotFound("No such reservation".to_string())
            }
            CancelError::NotAuthorized => {
                AppError::Forbidden("Only the reserver or the event host can cancel".to_string())
            }
            CancelError::AlreadyCancelled => {
                AppError::AlreadyCancelled("This reservation was already cancelled".to_string())
            }
            CancelError::Transient(source) => {
                warn!(error = %source, "transient cancellation failure");
                AppError::StoreUnavailable(source.to_string())
            }
        }
    }
}
