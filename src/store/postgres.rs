//! Postgres implementation. Atomicity for the contended quantity counter
//! comes from conditional updates (`... AND remaining_quantity >= $n
//! RETURNING remaining_quantity`) and row locks inside one transaction,
//! never from a read in one round trip and a write in the next.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::IdentityProvider;
use crate::models::{
    CreateEvent, Event, EventFilter, EventWithItems, FoodItem, Reservation, ReservationStatus,
    UpdateEvent,
};
use crate::store::{EventStore, ReservationStore, ReservedItem, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<FoodItem>, StoreError> {
        let items = sqlx::query_as::<_, FoodItem>(
            "SELECT id, event_id, name, total_quantity, remaining_quantity,
                    created_at, updated_at
             FROM food_items
             WHERE event_id = $1
             ORDER BY created_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

/// Row shape for reservations; status travels as text and is converted at
/// the boundary.
#[derive(FromRow)]
struct ReservationRow {
    id: Uuid,
    event_id: Uuid,
    food_item_id: Uuid,
    user_id: Uuid,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        let status = if row.status == ReservationStatus::Cancelled.as_str() {
            ReservationStatus::Cancelled
        } else {
            ReservationStatus::Reserved
        };
        Reservation {
            id: row.id,
            event_id: row.event_id,
            food_item_id: row.food_item_id,
            user_id: row.user_id,
            quantity: row.quantity,
            status,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[derive(FromRow)]
struct CancelTargetRow {
    food_item_id: Uuid,
    user_id: Uuid,
    quantity: i32,
    status: String,
    creator_id: Uuid,
}

const EVENT_COLUMNS: &str = "id, creator_id, title, description, location, campus, dietary, \
     event_date, pickup_start, pickup_end, created_at, updated_at";

const RETURNING_RESERVATION: &str =
    "RETURNING id, event_id, food_item_id, user_id, quantity, status, created_at, cancelled_at";

async fn insert_food_item(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    name: &str,
    quantity: i32,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO food_items (id, event_id, name, total_quantity, remaining_quantity)
         VALUES ($1, $2, $3, $4, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(name)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl EventStore for PgStore {
    async fn create_event(
        &self,
        creator_id: Uuid,
        req: CreateEvent,
    ) -> Result<EventWithItems, StoreError> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events
                 (id, creator_id, title, description, location, campus, dietary,
                  event_date, pickup_start, pickup_end)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {EVENT_COLUMNS}",
        ))
        .bind(Uuid::new_v4())
        .bind(creator_id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.location)
        .bind(&req.campus)
        .bind(&req.dietary)
        .bind(req.event_date)
        .bind(req.pickup_start)
        .bind(req.pickup_end)
        .fetch_one(&mut *tx)
        .await?;

        for item in &req.food_items {
            insert_food_item(&mut tx, event.id, &item.name, item.quantity).await?;
        }

        tx.commit().await?;

        let food_items = self.items_for(event.id).await?;
        Ok(EventWithItems { event, food_items })
    }

    async fn update_event(
        &self,
        event_id: Uuid,
        caller_id: Uuid,
        req: UpdateEvent,
    ) -> Result<EventWithItems, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(Uuid,)> =
            sqlx::query_as("SELECT creator_id FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            None => return Err(StoreError::EventNotFound),
            Some((creator_id,)) if creator_id != caller_id => return Err(StoreError::NotOwner),
            Some(_) => {}
        }

        sqlx::query(
            "UPDATE events
             SET title = $2, description = $3, location = $4, campus = $5, dietary = $6,
                 event_date = $7, pickup_start = $8, pickup_end = $9, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(event_id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.location)
        .bind(&req.campus)
        .bind(&req.dietary)
        .bind(req.event_date)
        .bind(req.pickup_start)
        .bind(req.pickup_end)
        .execute(&mut *tx)
        .await?;

        let existing: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM food_items WHERE event_id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_all(&mut *tx)
                .await?;
        let existing: Vec<Uuid> = existing.into_iter().map(|(id,)| id).collect();

        let kept: Vec<Uuid> = req.food_items.iter().filter_map(|i| i.id).collect();
        if kept.iter().any(|id| !existing.contains(id)) {
            return Err(StoreError::FoodItemNotFound);
        }

        // Items dropped from the list: delete when unreferenced, otherwise
        // zero them so reservation history keeps its target row.
        for id in existing.iter().copied().filter(|id| !kept.contains(id)) {
            let referenced: Option<(i32,)> =
                sqlx::query_as("SELECT 1 FROM reservations WHERE food_item_id = $1 LIMIT 1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if referenced.is_some() {
                sqlx::query(
                    "UPDATE food_items SET remaining_quantity = 0, updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query("DELETE FROM food_items WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for item in &req.food_items {
            match item.id {
                Some(id) => {
                    // Owner edit is the one sanctioned quantity reset.
                    sqlx::query(
                        "UPDATE food_items
                         SET name = $2, total_quantity = $3, remaining_quantity = $3,
                             updated_at = NOW()
                         WHERE id = $1",
                    )
                    .bind(id)
                    .bind(&item.name)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await?;
                }
                None => insert_food_item(&mut tx, event_id, &item.name, item.quantity).await?,
            }
        }

        tx.commit().await?;
        self.fetch_event(event_id).await
    }

    async fn delete_event(&self, event_id: Uuid, caller_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(Uuid,)> =
            sqlx::query_as("SELECT creator_id FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            None => return Err(StoreError::EventNotFound),
            Some((creator_id,)) if creator_id != caller_id => return Err(StoreError::NotOwner),
            Some(_) => {}
        }

        // food_items and reservations go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_event(&self, event_id: Uuid) -> Result<EventWithItems, StoreError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::EventNotFound)?;
        let food_items = self.items_for(event_id).await?;
        Ok(EventWithItems { event, food_items })
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventWithItems>, StoreError> {
        // Date cut in SQL; tag/text matching through the same
        // EventFilter::matches the in-memory store uses, so the two
        // backends cannot disagree on filter semantics.
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE $1 OR event_date >= $2
             ORDER BY event_date, created_at",
        ))
        .bind(filter.include_past)
        .bind(Utc::now().date_naive())
        .fetch_all(&self.pool)
        .await?;

        let events: Vec<Event> = events.into_iter().filter(|e| filter.matches(e)).collect();
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let items = sqlx::query_as::<_, FoodItem>(
            "SELECT id, event_id, name, total_quantity, remaining_quantity,
                    created_at, updated_at
             FROM food_items
             WHERE event_id = ANY($1)
             ORDER BY created_at, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(events
            .into_iter()
            .map(|event| {
                let food_items = items
                    .iter()
                    .filter(|i| i.event_id == event.id)
                    .cloned()
                    .collect();
                EventWithItems { event, food_items }
            })
            .collect())
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn reserve_item(
        &self,
        event_id: Uuid,
        food_item_id: Uuid,
        user_id: Uuid,
        quantity: i32,
    ) -> Result<ReservedItem, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The crux: check and decrement in one statement. Two concurrent
        // callers both reach this UPDATE; the row lock serializes them and
        // the loser re-evaluates the predicate against the decremented
        // value, so the counter can never go negative or double-spend.
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE food_items
             SET remaining_quantity = remaining_quantity - $1, updated_at = NOW()
             WHERE id = $2 AND event_id = $3 AND remaining_quantity >= $1
             RETURNING remaining_quantity",
        )
        .bind(quantity)
        .bind(food_item_id)
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((remaining_quantity,)) = updated else {
            // Zero rows: decide why, inside the same transaction.
            let event: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM events WHERE id = $1")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
            if event.is_none() {
                return Err(StoreError::EventNotFound);
            }
            let item: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM food_items WHERE id = $1 AND event_id = $2")
                    .bind(food_item_id)
                    .bind(event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(if item.is_none() {
                StoreError::FoodItemNotFound
            } else {
                StoreError::InsufficientQuantity
            });
        };

        // Log write rides the same transaction as the decrement; a failed
        // insert rolls the decrement back with it.
        let reservation: ReservationRow = sqlx::query_as(&format!(
            "INSERT INTO reservations (id, event_id, food_item_id, user_id, quantity, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             {RETURNING_RESERVATION}",
        ))
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(food_item_id)
        .bind(user_id)
        .bind(quantity)
        .bind(ReservationStatus::Reserved.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReservedItem {
            reservation: reservation.into(),
            remaining_quantity,
        })
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        caller_id: Uuid,
    ) -> Result<i32, StoreError> {
        let mut tx = self.pool.begin().await?;

        let target: Option<CancelTargetRow> = sqlx::query_as(
            "SELECT r.food_item_id, r.user_id, r.quantity, r.status, e.creator_id
             FROM reservations r
             JOIN events e ON e.id = r.event_id
             WHERE r.id = $1
             FOR UPDATE OF r",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(target) = target else {
            return Err(StoreError::ReservationNotFound);
        };
        if caller_id != target.user_id && caller_id != target.creator_id {
            return Err(StoreError::NotOwner);
        }
        if target.status == ReservationStatus::Cancelled.as_str() {
            return Err(StoreError::AlreadyCancelled);
        }

        // Restore and mark in the same transaction; the row lock above
        // stops a concurrent second cancel from restoring twice.
        let restored: Option<(i32,)> = sqlx::query_as(
            "UPDATE food_items
             SET remaining_quantity = remaining_quantity + $1, updated_at = NOW()
             WHERE id = $2
             RETURNING remaining_quantity",
        )
        .bind(target.quantity)
        .bind(target.food_item_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE reservations SET status = $2, cancelled_at = NOW() WHERE id = $1",
        )
        .bind(reservation_id)
        .bind(ReservationStatus::Cancelled.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // Item retired by an owner edit leaves nothing to restore onto.
        Ok(restored.map(|(r,)| r).unwrap_or(0))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            "SELECT id, event_id, food_item_id, user_id, quantity, status,
                    created_at, cancelled_at
             FROM reservations
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Reservation::from).collect())
    }
}

#[async_trait]
impl IdentityProvider for PgStore {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }
}
