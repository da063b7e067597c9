use serde::{Deserialize, Serialize};
use time::{Date, Time};

use crate::{
    formats::{clock_time, iso_date},
    meals::repo_types::{DailySummary, DaySummary, Meal},
};

/// Body of both create and update. Create requires `mealName` and `mealDate`;
/// update treats every omitted field as "keep".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRequest {
    pub meal_name: Option<String>,
    pub meal_type: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub meal_date: Option<Date>,
    #[serde(default, with = "clock_time::option")]
    pub meal_time: Option<Time>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub fiber: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MealsResponse {
    pub meals: Vec<Meal>,
}

#[derive(Debug, Serialize)]
pub struct MealResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub meal: Meal,
}

#[derive(Debug, Serialize)]
pub struct DailySummaryResponse {
    pub summary: DailySummary,
}

#[derive(Debug, Serialize)]
pub struct WeeklySummaryResponse {
    pub summary: Vec<DaySummary>,
}
