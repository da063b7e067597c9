use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    formats::iso_date,
    users::repo_types::{Goal, UserProfile},
};

/// Every field is optional; omitted ones keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub activity_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    pub goal_type: Option<String>,
    pub target_value: Option<f64>,
    #[serde(default, with = "iso_date::option")]
    pub target_date: Option<Date>,
    pub daily_calories: Option<f64>,
    pub daily_protein: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fats: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct GoalsResponse {
    pub goals: Vec<Goal>,
}

#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub message: &'static str,
    pub goal: Goal,
}
