use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named food type within an event. `remaining_quantity` is the contended
/// counter: only the reservation service and the owner's event edit may
/// write it, and it never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodItem {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub total_quantity: i32,
    pub remaining_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
