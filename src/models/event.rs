use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::food_item::FoodItem;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub campus: Vec<String>,
    pub dietary: Vec<String>,
    pub event_date: NaiveDate,
    pub pickup_start: NaiveTime,
    pub pickup_end: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event together with its food items, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct EventWithItems {
    #[serde(flatten)]
    pub event: Event,
    pub food_items: Vec<FoodItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    #[serde(default)]
    pub campus: Vec<String>,
    #[serde(default)]
    pub dietary: Vec<String>,
    pub event_date: NaiveDate,
    pub pickup_start: NaiveTime,
    pub pickup_end: NaiveTime,
    #[serde(default)]
    pub food_items: Vec<NewFoodItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFoodItem {
    pub name: String,
    pub quantity: i32,
}

/// Owner edit. The food item list replaces the current one: entries with an
/// `id` update that item (resetting its quantity), entries without one are
/// inserted, and current items missing from the list are retired.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    #[serde(default)]
    pub campus: Vec<String>,
    #[serde(default)]
    pub dietary: Vec<String>,
    pub event_date: NaiveDate,
    pub pickup_start: NaiveTime,
    pub pickup_end: NaiveTime,
    #[serde(default)]
    pub food_items: Vec<UpdatedFoodItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedFoodItem {
    pub id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
}

/// Listing filters, matching the browse page: substring match on tags and
/// text, past events hidden unless explicitly requested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub campus: Option<String>,
    pub dietary: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub include_past: bool,
}

impl EventFilter {
    /// Tag/text matching shared by both store implementations so the two
    /// backends cannot drift apart.
    pub fn matches(&self, event: &Event) -> bool {
        let tag_match = |tags: &[String], wanted: &Option<String>| match wanted {
            None => true,
            Some(w) => tags
                .iter()
                .any(|t| t.to_lowercase().contains(&w.to_lowercase())),
        };

        if !tag_match(&event.campus, &self.campus) {
            return false;
        }
        if !tag_match(&event.dietary, &self.dietary) {
            return false;
        }
        match &self.q {
            None => true,
            Some(q) => {
                let q = q.to_lowercase();
                event.title.to_lowercase().contains(&q)
                    || event.location.to_lowercase().contains(&q)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            title: "Leftover Pizza Night".into(),
            description: None,
            location: "GSU Backcourt".into(),
            campus: vec!["Central Campus".into()],
            dietary: vec!["Vegetarian".into()],
            event_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            pickup_start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            pickup_end: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filter_matches_are_case_insensitive_substrings() {
        let event = sample_event();

        let filter = EventFilter {
            campus: Some("central".into()),
            dietary: Some("VEGETARIAN".into()),
            q: Some("pizza".into()),
            include_past: false,
        };
        assert!(filter.matches(&event));
    }

    #[test]
    fn filter_rejects_wrong_campus() {
        let event = sample_event();

        let filter = EventFilter {
            campus: Some("East Campus".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(EventFilter::default().matches(&sample_event()));
    }
}
