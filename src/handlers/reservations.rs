use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::ReserveRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Serialize)]
struct CancelPayload {
    reservation_id: Uuid,
    remaining_quantity: i32,
}

/// `POST /events/:id/reservations`. The response carries the authoritative
/// post-decrement remaining quantity; clients display that instead of
/// subtracting from whatever they last fetched.
pub async fn reserve_food(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    Json(req): Json<ReserveRequest>,
) -> Result<Response, AppError> {
    let reserved = state.reservations.reserve(caller, event_id, req).await?;
    Ok(created(reserved, "Reserved successfully").into_response())
}

/// `DELETE /reservations/:id`.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(reservation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let remaining_quantity = state.reservations.cancel(caller, reservation_id).await?;
    Ok(success(
        CancelPayload {
            reservation_id,
            remaining_quantity,
        },
        "Reservation cancelled",
    )
    .into_response())
}

/// `GET /reservations/mine`.
pub async fn my_reservations(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, AppError> {
    let reservations = state.reservations.reservations_for(caller).await?;
    Ok(success(reservations, "Reservations fetched").into_response())
}
