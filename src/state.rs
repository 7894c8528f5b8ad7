use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::service::ReservationService;
use crate::store::EventStore;

/// Shared handler state. Trait objects so the same router runs on Postgres
/// in production and on the in-memory store in tests.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub reservations: Arc<ReservationService>,
    pub identity: Arc<dyn IdentityProvider>,
}
