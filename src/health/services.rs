use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    dto::{SyncOutcome, SyncRecord, SyncStatus},
    repo,
    repo_types::NewMetric,
};
use crate::formats::parse_timestamp;

pub const SYNC_SOURCE: &str = "HealthKit";
pub const MANUAL_SOURCE: &str = "Manual";

/// Result of one sync call, in request order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Accepted)
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

/// Shape-check one raw record. The error string is reported back to the client.
pub fn validate_record(raw: &Value) -> Result<NewMetric, String> {
    let record: SyncRecord =
        serde_json::from_value(raw.clone()).map_err(|e| format!("malformed record: {e}"))?;

    if [Some(&record.metric_type), Some(&record.unit), record.source.as_ref()]
        .into_iter()
        .flatten()
        .any(|field| field.contains('\0'))
    {
        return Err("text fields must not contain NUL characters".into());
    }

    let metric_type = record.metric_type.trim();
    if metric_type.is_empty() {
        return Err("type is required".into());
    }
    let unit = record.unit.trim();
    if unit.is_empty() {
        return Err("unit is required".into());
    }
    if !record.value.is_finite() {
        return Err("value must be a finite number".into());
    }
    let recorded_at = parse_timestamp(&record.recorded_at)
        .ok_or_else(|| "recordedAt must be an RFC 3339 timestamp".to_string())?;
    let source = record
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SYNC_SOURCE);

    Ok(NewMetric {
        metric_type: metric_type.to_string(),
        value: record.value,
        unit: unit.to_string(),
        recorded_at,
        source: source.to_string(),
    })
}

/// Split raw records into upsertable metrics and per-index outcomes.
pub fn partition(records: &[Value]) -> (Vec<NewMetric>, Vec<SyncOutcome>) {
    let mut accepted = Vec::with_capacity(records.len());
    let mut outcomes = Vec::with_capacity(records.len());
    for (index, raw) in records.iter().enumerate() {
        match validate_record(raw) {
            Ok(metric) => {
                accepted.push(metric);
                outcomes.push(SyncOutcome {
                    index,
                    status: SyncStatus::Accepted,
                    reason: None,
                });
            }
            Err(reason) => outcomes.push(SyncOutcome {
                index,
                status: SyncStatus::Rejected,
                reason: Some(reason),
            }),
        }
    }
    (accepted, outcomes)
}

/// Upsert every valid record in one transaction. A database error rolls back
/// the whole batch; invalid records never reach the database.
pub async fn sync_metrics(db: &PgPool, user_id: Uuid, records: &[Value]) -> anyhow::Result<SyncReport> {
    let (metrics, outcomes) = partition(records);

    if !metrics.is_empty() {
        repo::upsert_batch(db, user_id, &metrics).await?;
    }

    Ok(SyncReport { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn valid_record_gets_default_source() {
        let m = validate_record(&json!({
            "type": "steps", "value": 8042, "unit": "count",
            "recordedAt": "2024-01-01T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.metric_type, "steps");
        assert_eq!(m.value, 8042.0);
        assert_eq!(m.source, SYNC_SOURCE);
        assert_eq!(m.recorded_at, datetime!(2024-01-01 08:00:00 UTC));
    }

    #[test]
    fn explicit_source_is_kept() {
        let m = validate_record(&json!({
            "type": "water", "value": 0.5, "unit": "L",
            "recordedAt": "2024-01-01T08:00:00Z", "source": "Watch"
        }))
        .unwrap();
        assert_eq!(m.source, "Watch");
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(validate_record(&json!("steps")).is_err());
        assert!(validate_record(&json!({"type": "steps", "value": "many", "unit": "count",
            "recordedAt": "2024-01-01T08:00:00Z"}))
        .is_err());
        assert!(validate_record(&json!({"type": " ", "value": 1, "unit": "count",
            "recordedAt": "2024-01-01T08:00:00Z"}))
        .is_err());
        let err = validate_record(&json!({"type": "steps", "value": 1, "unit": "count",
            "recordedAt": "last tuesday"}))
        .unwrap_err();
        assert!(err.contains("recordedAt"));
    }

    #[test]
    fn nul_characters_are_rejected_before_the_database() {
        for record in [
            json!({"type": "st\u{0}eps", "value": 1, "unit": "count",
                   "recordedAt": "2024-01-01T08:00:00Z"}),
            json!({"type": "steps", "value": 1, "unit": "co\u{0}unt",
                   "recordedAt": "2024-01-01T08:00:00Z"}),
            json!({"type": "steps", "value": 1, "unit": "count",
                   "recordedAt": "2024-01-01T08:00:00Z", "source": "\u{0}"}),
        ] {
            assert!(validate_record(&record).unwrap_err().contains("NUL"));
        }

        let records = vec![
            json!({"type": "steps", "value": 1, "unit": "count", "recordedAt": "2024-01-01T08:00:00Z"}),
            json!({"type": "st\u{0}eps", "value": 2, "unit": "count", "recordedAt": "2024-01-01T08:00:00Z"}),
        ];
        let (metrics, outcomes) = partition(&records);
        assert_eq!(metrics.len(), 1);
        assert_eq!(outcomes[1].status, SyncStatus::Rejected);
    }

    #[test]
    fn partition_reports_each_index() {
        let records = vec![
            json!({"type": "steps", "value": 1, "unit": "count", "recordedAt": "2024-01-01T08:00:00Z"}),
            json!({"type": "steps"}),
            json!({"type": "weight", "value": 71.2, "unit": "kg", "recordedAt": "2024-01-01"}),
        ];
        let (metrics, outcomes) = partition(&records);
        assert_eq!(metrics.len(), 2);
        let statuses: Vec<_> = outcomes.iter().map(|o| (o.index, o.status)).collect();
        assert_eq!(
            statuses,
            vec![
                (0, SyncStatus::Accepted),
                (1, SyncStatus::Rejected),
                (2, SyncStatus::Accepted)
            ]
        );
        assert!(outcomes[1].reason.is_some());

        let report = SyncReport { outcomes };
        assert_eq!(report.accepted(), 2);
        assert_eq!(report.rejected(), 1);
    }
}
