use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::formats::{clock_time, iso_date};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_name: String,
    pub meal_type: Option<String>,
    #[serde(with = "iso_date")]
    pub meal_date: Date,
    #[serde(with = "clock_time::option")]
    pub meal_time: Option<Time>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub fiber: Option<f64>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Totals for one day. Sums are `None` when there is nothing to add up.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailySummary {
    pub meal_count: i64,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fats: Option<f64>,
    pub total_fiber: Option<f64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DaySummary {
    #[serde(with = "iso_date")]
    pub meal_date: Date,
    pub meal_count: i64,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fats: Option<f64>,
    pub total_fiber: Option<f64>,
}
