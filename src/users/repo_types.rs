use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::formats::iso_date;

/// `users` joined with the optional `user_profiles` row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub firebase_uid: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub activity_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_type: String,
    pub target_value: Option<f64>,
    #[serde(with = "iso_date::option")]
    pub target_date: Option<Date>,
    pub daily_calories: Option<f64>,
    pub daily_protein: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fats: Option<f64>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
