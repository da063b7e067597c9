use serde::Serialize;
use sqlx::FromRow;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

use crate::formats::clock_time;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub push_token: String,
    pub device_type: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Stored preferences, or the defaults when the user never saved any
/// (then `user_id` and `updated_at` are absent).
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct NotificationPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub meal_reminders: bool,
    pub goal_reminders: bool,
    pub achievement_notifications: bool,
    pub daily_summary: bool,
    #[serde(with = "clock_time::option")]
    pub quiet_hours_start: Option<Time>,
    #[serde(with = "clock_time::option")]
    pub quiet_hours_end: Option<Time>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            user_id: None,
            meal_reminders: true,
            goal_reminders: true,
            achievement_notifications: true,
            daily_summary: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub data: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}
