//! In-memory store backing the test suite and local development without a
//! database. Every mutation runs under a single mutex guard, which is the
//! serialized single-writer way of satisfying the same atomicity contract
//! the Postgres implementation gets from conditional updates.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::IdentityProvider;
use crate::models::{
    CreateEvent, Event, EventFilter, EventWithItems, FoodItem, Reservation, ReservationStatus,
    UpdateEvent,
};
use crate::store::{EventStore, ReservationStore, ReservedItem, StoreError};

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    items: HashMap<Uuid, FoodItem>,
    reservations: HashMap<Uuid, Reservation>,
    sessions: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bearer token for a user, standing in for the external
    /// identity provider writing the sessions table.
    pub fn insert_session(&self, token: &str, user_id: Uuid) {
        self.inner
            .lock()
            .expect("memory store poisoned")
            .sessions
            .insert(token.to_string(), user_id);
    }
}

impl Inner {
    fn event_with_items(&self, event: &Event) -> EventWithItems {
        let mut food_items: Vec<FoodItem> = self
            .items
            .values()
            .filter(|i| i.event_id == event.id)
            .cloned()
            .collect();
        food_items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        EventWithItems {
            event: event.clone(),
            food_items,
        }
    }

    fn item_has_reservations(&self, item_id: Uuid) -> bool {
        self.reservations
            .values()
            .any(|r| r.food_item_id == item_id)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(
        &self,
        creator_id: Uuid,
        req: CreateEvent,
    ) -> Result<EventWithItems, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            creator_id,
            title: req.title,
            description: req.description,
            location: req.location,
            campus: req.campus,
            dietary: req.dietary,
            event_date: req.event_date,
            pickup_start: req.pickup_start,
            pickup_end: req.pickup_end,
            created_at: now,
            updated_at: now,
        };
        for item in req.food_items {
            let food_item = FoodItem {
                id: Uuid::new_v4(),
                event_id: event.id,
                name: item.name,
                total_quantity: item.quantity,
                remaining_quantity: item.quantity,
                created_at: now,
                updated_at: now,
            };
            inner.items.insert(food_item.id, food_item);
        }
        inner.events.insert(event.id, event.clone());
        Ok(inner.event_with_items(&event))
    }

    async fn update_event(
        &self,
        event_id: Uuid,
        caller_id: Uuid,
        req: UpdateEvent,
    ) -> Result<EventWithItems, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let now = Utc::now();

        let event = inner.events.get(&event_id).ok_or(StoreError::EventNotFound)?;
        if event.creator_id != caller_id {
            return Err(StoreError::NotOwner);
        }

        let kept: Vec<Uuid> = req.food_items.iter().filter_map(|i| i.id).collect();
        for id in &kept {
            let item = inner.items.get(id).ok_or(StoreError::FoodItemNotFound)?;
            if item.event_id != event_id {
                return Err(StoreError::FoodItemNotFound);
            }
        }

        // Retire current items missing from the new list: drop them when no
        // reservation references them, otherwise zero them so history keeps
        // its target row.
        let current: Vec<Uuid> = inner
            .items
            .values()
            .filter(|i| i.event_id == event_id)
            .map(|i| i.id)
            .collect();
        for id in current {
            if kept.contains(&id) {
                continue;
            }
            if inner.item_has_reservations(id) {
                let item = inner.items.get_mut(&id).expect("item just listed");
                item.remaining_quantity = 0;
                item.updated_at = now;
            } else {
                inner.items.remove(&id);
            }
        }

        for entry in req.food_items {
            match entry.id {
                Some(id) => {
                    let item = inner.items.get_mut(&id).expect("id checked above");
                    item.name = entry.name;
                    item.total_quantity = entry.quantity;
                    item.remaining_quantity = entry.quantity;
                    item.updated_at = now;
                }
                None => {
                    let item = FoodItem {
                        id: Uuid::new_v4(),
                        event_id,
                        name: entry.name,
                        total_quantity: entry.quantity,
                        remaining_quantity: entry.quantity,
                        created_at: now,
                        updated_at: now,
                    };
                    inner.items.insert(item.id, item);
                }
            }
        }

        let event = inner.events.get_mut(&event_id).expect("checked above");
        event.title = req.title;
        event.description = req.description;
        event.location = req.location;
        event.campus = req.campus;
        event.dietary = req.dietary;
        event.event_date = req.event_date;
        event.pickup_start = req.pickup_start;
        event.pickup_end = req.pickup_end;
        event.updated_at = now;
        let event = event.clone();

        Ok(inner.event_with_items(&event))
    }

    async fn delete_event(&self, event_id: Uuid, caller_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let event = inner.events.get(&event_id).ok_or(StoreError::EventNotFound)?;
        if event.creator_id != caller_id {
            return Err(StoreError::NotOwner);
        }
        inner.events.remove(&event_id);
        inner.items.retain(|_, i| i.event_id != event_id);
        inner.reservations.retain(|_, r| r.event_id != event_id);
        Ok(())
    }

    async fn fetch_event(&self, event_id: Uuid) -> Result<EventWithItems, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let event = inner.events.get(&event_id).ok_or(StoreError::EventNotFound)?;
        Ok(inner.event_with_items(event))
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventWithItems>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let today = Utc::now().date_naive();
        let mut events: Vec<&Event> = inner
            .events
            .values()
            .filter(|e| filter.include_past || e.event_date >= today)
            .filter(|e| filter.matches(e))
            .collect();
        events.sort_by(|a, b| {
            a.event_date
                .cmp(&b.event_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(events
            .into_iter()
            .map(|e| inner.event_with_items(e))
            .collect())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn reserve_item(
        &self,
        event_id: Uuid,
        food_item_id: Uuid,
        user_id: Uuid,
        quantity: i32,
    ) -> Result<ReservedItem, StoreError> {
        // One guard for the whole read-check-write; concurrent callers
        // serialize here.
        let mut inner = self.inner.lock().expect("memory store poisoned");

        if !inner.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound);
        }
        let item = inner
            .items
            .get_mut(&food_item_id)
            .filter(|i| i.event_id == event_id)
            .ok_or(StoreError::FoodItemNotFound)?;
        if item.remaining_quantity < quantity {
            return Err(StoreError::InsufficientQuantity);
        }

        item.remaining_quantity -= quantity;
        item.updated_at = Utc::now();
        let remaining_quantity = item.remaining_quantity;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            event_id,
            food_item_id,
            user_id,
            quantity,
            status: ReservationStatus::Reserved,
            created_at: Utc::now(),
            cancelled_at: None,
        };
        inner.reservations.insert(reservation.id, reservation.clone());

        Ok(ReservedItem {
            reservation,
            remaining_quantity,
        })
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        caller_id: Uuid,
    ) -> Result<i32, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");

        let reservation = inner
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(StoreError::ReservationNotFound)?;

        let event_creator = inner.events.get(&reservation.event_id).map(|e| e.creator_id);
        if caller_id != reservation.user_id && Some(caller_id) != event_creator {
            return Err(StoreError::NotOwner);
        }
        if reservation.status == ReservationStatus::Cancelled {
            return Err(StoreError::AlreadyCancelled);
        }

        let remaining = match inner.items.get_mut(&reservation.food_item_id) {
            Some(item) => {
                item.remaining_quantity += reservation.quantity;
                item.updated_at = Utc::now();
                item.remaining_quantity
            }
            // Item retired by an owner edit; nothing left to restore onto.
            None => 0,
        };

        let stored = inner
            .reservations
            .get_mut(&reservation_id)
            .expect("fetched above");
        stored.status = ReservationStatus::Cancelled;
        stored.cancelled_at = Some(Utc::now());

        Ok(remaining)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut reservations: Vec<Reservation> = inner
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reservations)
    }
}

#[async_trait]
impl IdentityProvider for MemoryStore {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.sessions.get(token).copied())
    }
}
