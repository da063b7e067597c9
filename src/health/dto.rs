use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::health::repo_types::HealthMetric;

/// `metrics` stays untyped so one malformed record is rejected on its own
/// instead of failing the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub metrics: Option<serde_json::Value>,
}

/// One record as sent by the HealthKit sync on the device.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub index: usize,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub message: &'static str,
    pub synced_count: usize,
    pub rejected_count: usize,
    pub results: Vec<SyncOutcome>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMetricRequest {
    pub metric_type: Option<String>,
    pub metric_value: Option<f64>,
    pub metric_unit: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub recorded_at: Option<OffsetDateTime>,
    pub source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetricRequest {
    pub metric_value: Option<f64>,
    pub metric_unit: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub recorded_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: Vec<HealthMetric>,
}

#[derive(Debug, Serialize)]
pub struct MetricResponse {
    pub message: &'static str,
    pub metric: HealthMetric,
}
