use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{events, health_check, reservations};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:id/reservations",
            post(reservations::reserve_food),
        )
        .route("/reservations/mine", get(reservations::my_reservations))
        .route(
            "/reservations/:id",
            delete(reservations::cancel_reservation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
