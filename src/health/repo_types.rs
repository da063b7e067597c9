use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthMetric {
    pub id: Uuid,
    pub user_id: Uuid,
    pub metric_type: String,
    pub metric_value: f64,
    pub metric_unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A metric that passed validation and is ready to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMetric {
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: OffsetDateTime,
    pub source: String,
}
