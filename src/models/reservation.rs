use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

/// One user's claim on a quantity of one food item. Cancellation marks the
/// record rather than deleting it, so the log stays append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Uuid,
    pub food_item_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Body of `POST /events/:id/reservations`. A missing quantity means 1; an
/// explicit non-positive quantity is rejected, never coerced.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    pub food_item_id: Uuid,
    pub quantity: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // The column text and the JSON wire form are the same strings; a drift
    // here would corrupt the status round trip through the database.
    #[test]
    fn status_text_matches_wire_form() {
        for status in [ReservationStatus::Reserved, ReservationStatus::Cancelled] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, serde_json::Value::String(status.as_str().to_owned()));
        }
    }
}
