use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::health::{
    dto::UpdateMetricRequest,
    repo_types::{HealthMetric, NewMetric},
};

const METRIC_COLUMNS: &str = "hm.id, hm.user_id, hm.metric_type, hm.metric_value, hm.metric_unit, \
    hm.recorded_at, hm.source, hm.created_at";

/// Insert or overwrite value/unit for the (user, type, recorded_at, source) key.
pub async fn upsert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    metric: &NewMetric,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO health_metrics (user_id, metric_type, metric_value, metric_unit,
                                    recorded_at, source, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id, metric_type, recorded_at, source)
        DO UPDATE SET metric_value = EXCLUDED.metric_value,
                      metric_unit  = EXCLUDED.metric_unit
        "#,
    )
    .bind(user_id)
    .bind(&metric.metric_type)
    .bind(metric.value)
    .bind(&metric.unit)
    .bind(metric.recorded_at)
    .bind(&metric.source)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("upsert metric {}", metric.metric_type))?;
    Ok(())
}

/// Same key semantics as [`upsert_tx`], returning the stored row.
pub async fn insert(db: &PgPool, user_id: Uuid, metric: &NewMetric) -> anyhow::Result<HealthMetric> {
    let sql = format!(
        r#"
        INSERT INTO health_metrics AS hm (user_id, metric_type, metric_value, metric_unit,
                                          recorded_at, source, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id, metric_type, recorded_at, source)
        DO UPDATE SET metric_value = EXCLUDED.metric_value,
                      metric_unit  = EXCLUDED.metric_unit
        RETURNING {METRIC_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, HealthMetric>(&sql)
        .bind(user_id)
        .bind(&metric.metric_type)
        .bind(metric.value)
        .bind(&metric.unit)
        .bind(metric.recorded_at)
        .bind(&metric.source)
        .fetch_one(db)
        .await
        .context("insert metric")?;
    Ok(row)
}

/// Upsert a validated batch in one transaction; any failure keeps none of it.
pub async fn upsert_batch(db: &PgPool, user_id: Uuid, metrics: &[NewMetric]) -> anyhow::Result<()> {
    let mut tx = db.begin().await.context("begin tx")?;
    for metric in metrics {
        upsert_tx(&mut tx, user_id, metric).await?;
    }
    tx.commit().await.context("commit tx")?;
    Ok(())
}

/// Newest first; `metric_type = None` lists every type.
pub async fn list(
    db: &PgPool,
    firebase_uid: &str,
    metric_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<HealthMetric>> {
    let sql = format!(
        r#"
        SELECT {METRIC_COLUMNS}
        FROM health_metrics hm
        INNER JOIN users u ON hm.user_id = u.id
        WHERE u.firebase_uid = $1 AND ($2::TEXT IS NULL OR hm.metric_type = $2)
        ORDER BY hm.recorded_at DESC
        LIMIT $3 OFFSET $4
        "#
    );
    let rows = sqlx::query_as::<_, HealthMetric>(&sql)
        .bind(firebase_uid)
        .bind(metric_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list metrics")?;
    Ok(rows)
}

/// Metrics of one type recorded within `start..=end`.
pub async fn list_in_range(
    db: &PgPool,
    firebase_uid: &str,
    metric_type: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> anyhow::Result<Vec<HealthMetric>> {
    let sql = format!(
        r#"
        SELECT {METRIC_COLUMNS}
        FROM health_metrics hm
        INNER JOIN users u ON hm.user_id = u.id
        WHERE u.firebase_uid = $1 AND hm.metric_type = $2
          AND hm.recorded_at BETWEEN $3 AND $4
        ORDER BY hm.recorded_at DESC
        "#
    );
    let rows = sqlx::query_as::<_, HealthMetric>(&sql)
        .bind(firebase_uid)
        .bind(metric_type)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await
        .context("list metrics by range")?;
    Ok(rows)
}

/// Fails with a unique violation when the new `recorded_at` lands on another
/// row's key.
pub async fn update(
    db: &PgPool,
    firebase_uid: &str,
    metric_id: Uuid,
    req: &UpdateMetricRequest,
) -> anyhow::Result<Option<HealthMetric>> {
    let sql = format!(
        r#"
        UPDATE health_metrics hm
        SET metric_value = COALESCE($1, hm.metric_value),
            metric_unit  = COALESCE($2, hm.metric_unit),
            recorded_at  = COALESCE($3, hm.recorded_at)
        FROM users u
        WHERE hm.user_id = u.id AND u.firebase_uid = $4 AND hm.id = $5
        RETURNING {METRIC_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, HealthMetric>(&sql)
        .bind(req.metric_value)
        .bind(req.metric_unit.as_deref())
        .bind(req.recorded_at)
        .bind(firebase_uid)
        .bind(metric_id)
        .fetch_optional(db)
        .await
        .context("update metric")?;
    Ok(row)
}

pub async fn delete(db: &PgPool, firebase_uid: &str, metric_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM health_metrics hm
        USING users u
        WHERE hm.user_id = u.id AND u.firebase_uid = $1 AND hm.id = $2
        "#,
    )
    .bind(firebase_uid)
    .bind(metric_id)
    .execute(db)
    .await
    .context("delete metric")?;
    Ok(result.rows_affected() > 0)
}
