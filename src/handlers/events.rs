use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::{CreateEvent, EventFilter, UpdateEvent};
use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

fn validate_event_fields(
    title: &str,
    location: &str,
    quantities: impl Iterator<Item = i32>,
) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("Title must not be empty".into()));
    }
    if location.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Location must not be empty".into(),
        ));
    }
    for qty in quantities {
        if qty < 0 {
            return Err(AppError::ValidationError(
                "Food quantities must not be negative".into(),
            ));
        }
    }
    Ok(())
}

fn map_event_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::EventNotFound => AppError::EventNotFound("This event does not exist".into()),
        StoreError::FoodItemNotFound => {
            AppError::FoodItemNotFound("This food item is not part of the event".into())
        }
        StoreError::NotOwner => {
            AppError::Forbidden("Only the event host can change this event".into())
        }
        StoreError::Unavailable(source) => AppError::StoreUnavailable(source.to_string()),
        other => AppError::InternalServerError(other.to_string()),
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    let events = state
        .events
        .list_events(&filter)
        .await
        .map_err(map_event_store_error)?;
    Ok(success(events, "Events fetched").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .fetch_event(event_id)
        .await
        .map_err(map_event_store_error)?;
    Ok(success(event, "Event fetched").into_response())
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateEvent>,
) -> Result<Response, AppError> {
    let user_id = caller.require()?;
    validate_event_fields(
        &req.title,
        &req.location,
        req.food_items.iter().map(|i| i.quantity),
    )?;

    let event = state
        .events
        .create_event(user_id, req)
        .await
        .map_err(map_event_store_error)?;
    Ok(created(event, "Event created").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    Json(req): Json<UpdateEvent>,
) -> Result<Response, AppError> {
    let user_id = caller.require()?;
    validate_event_fields(
        &req.title,
        &req.location,
        req.food_items.iter().map(|i| i.quantity),
    )?;

    let event = state
        .events
        .update_event(event_id, user_id, req)
        .await
        .map_err(map_event_store_error)?;
    Ok(success(event, "Event updated").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user_id = caller.require()?;
    state
        .events
        .delete_event(event_id, user_id)
        .await
        .map_err(map_event_store_error)?;
    Ok(empty_success("Event deleted").into_response())
}
