use serde::{Deserialize, Serialize};
use time::Time;

use crate::{
    formats::clock_time,
    notifications::{
        push::PushTicket,
        repo_types::{NotificationDevice, NotificationPreferences, NotificationRecord},
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub push_token: String,
    pub device_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterDeviceRequest {
    #[serde(default)]
    pub push_token: String,
}

/// Omitted fields keep their stored (or default) value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub meal_reminders: Option<bool>,
    pub goal_reminders: Option<bool>,
    pub achievement_notifications: Option<bool>,
    pub daily_summary: Option<bool>,
    #[serde(default, with = "clock_time::option")]
    pub quiet_hours_start: Option<Time>,
    #[serde(default, with = "clock_time::option")]
    pub quiet_hours_end: Option<Time>,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub message: &'static str,
    pub device: NotificationDevice,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub preferences: NotificationPreferences,
}

#[derive(Debug, Serialize)]
pub struct TestNotificationResponse {
    pub message: &'static str,
    pub tickets: Vec<PushTicket>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub message: &'static str,
    pub notification: NotificationRecord,
}
