use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    envelope::{MessageResponse, Pagination},
    error::{is_unique_violation, ApiError, ApiResult, JsonBody, OrInternal, QueryParams},
    formats::{parse_date, parse_timestamp},
    health::{
        dto::{
            AddMetricRequest, MetricResponse, MetricsResponse, SyncRequest, SyncResponse,
            UpdateMetricRequest,
        },
        repo,
        repo_types::NewMetric,
        services::{self, MANUAL_SOURCE},
    },
    state::AppState,
    users::handlers::{parse_id, require_user_id},
};

const DEFAULT_PAGE: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health/sync", post(sync_health_data))
        .route("/health/metrics", get(list_metrics).post(add_metric))
        // GET reads the segment as a metric type, PUT/DELETE as a metric id.
        .route(
            "/health/metrics/:metric",
            get(metrics_by_type).put(update_metric).delete(delete_metric),
        )
        .route(
            "/health/metrics/:metric/:start_date/:end_date",
            get(metrics_by_date_range),
        )
}

#[instrument(skip_all)]
pub async fn sync_health_data(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<SyncRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let records = match body.metrics {
        Some(serde_json::Value::Array(records)) if !records.is_empty() => records,
        _ => return Err(ApiError::bad_request("Invalid metrics data")),
    };

    let user_id = require_user_id(&state, &identity.uid).await?;
    let report = services::sync_metrics(&state.db, user_id, &records)
        .await
        .or_internal("Failed to sync health data")?;

    let (synced, rejected) = (report.accepted(), report.rejected());
    if rejected > 0 {
        warn!(%user_id, synced, rejected, "health sync rejected some records");
    } else {
        info!(%user_id, synced, "health data synced");
    }
    Ok(Json(SyncResponse {
        message: "Health data synced successfully",
        synced_count: synced,
        rejected_count: rejected,
        results: report.outcomes,
    }))
}

#[instrument(skip_all)]
pub async fn list_metrics(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> ApiResult<Json<MetricsResponse>> {
    let (limit, offset) = page.resolve(DEFAULT_PAGE);
    let metrics = repo::list(&state.db, &identity.uid, None, limit, offset)
        .await
        .or_internal("Failed to get health metrics")?;
    Ok(Json(MetricsResponse { metrics }))
}

#[instrument(skip_all)]
pub async fn metrics_by_type(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(metric_type): Path<String>,
    QueryParams(page): QueryParams<Pagination>,
) -> ApiResult<Json<MetricsResponse>> {
    let (limit, offset) = page.resolve(DEFAULT_PAGE);
    let metrics = repo::list(&state.db, &identity.uid, Some(&metric_type), limit, offset)
        .await
        .or_internal("Failed to get metric")?;
    Ok(Json(MetricsResponse { metrics }))
}

/// Inclusive time window from two path segments. A bare date as the end
/// covers that whole day.
pub fn time_window(start: &str, end: &str) -> ApiResult<(OffsetDateTime, OffsetDateTime)> {
    let invalid = || ApiError::bad_request("Invalid date, expected YYYY-MM-DD or RFC 3339");
    let from = parse_timestamp(start).ok_or_else(invalid)?;
    let to = match parse_date(end) {
        Some(day) => day
            .with_hms_micro(23, 59, 59, 999_999)
            .map_err(|_| invalid())?
            .assume_utc(),
        None => parse_timestamp(end).ok_or_else(invalid)?,
    };
    if from > to {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }
    Ok((from, to))
}

#[instrument(skip_all)]
pub async fn metrics_by_date_range(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((metric_type, start, end)): Path<(String, String, String)>,
) -> ApiResult<Json<MetricsResponse>> {
    let (from, to) = time_window(&start, &end)?;
    let metrics = repo::list_in_range(&state.db, &identity.uid, &metric_type, from, to)
        .await
        .or_internal("Failed to get metrics")?;
    Ok(Json(MetricsResponse { metrics }))
}

#[instrument(skip_all)]
pub async fn add_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<AddMetricRequest>,
) -> ApiResult<(StatusCode, Json<MetricResponse>)> {
    let metric_type = non_empty(body.metric_type.as_deref())
        .ok_or_else(|| ApiError::bad_request("metricType is required"))?;
    let unit = non_empty(body.metric_unit.as_deref())
        .ok_or_else(|| ApiError::bad_request("metricUnit is required"))?;
    let value = body
        .metric_value
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::bad_request("metricValue must be a number"))?;

    let metric = NewMetric {
        metric_type,
        value,
        unit,
        recorded_at: body.recorded_at.unwrap_or_else(OffsetDateTime::now_utc),
        source: non_empty(body.source.as_deref()).unwrap_or_else(|| MANUAL_SOURCE.to_string()),
    };

    let user_id = require_user_id(&state, &identity.uid).await?;
    let metric = repo::insert(&state.db, user_id, &metric)
        .await
        .or_internal("Failed to add health metric")?;
    Ok((
        StatusCode::CREATED,
        Json(MetricResponse {
            message: "Health metric added successfully",
            metric,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn update_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(metric_id): Path<String>,
    JsonBody(body): JsonBody<UpdateMetricRequest>,
) -> ApiResult<Json<MetricResponse>> {
    let metric_id = parse_id(&metric_id, "metric")?;
    let metric = repo::update(&state.db, &identity.uid, metric_id, &body)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("A metric with this type, time and source already exists")
            } else {
                ApiError::internal("Failed to update health metric", e)
            }
        })?
        .ok_or_else(|| ApiError::not_found("Health metric not found"))?;
    Ok(Json(MetricResponse {
        message: "Health metric updated successfully",
        metric,
    }))
}

#[instrument(skip_all)]
pub async fn delete_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(metric_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let metric_id = parse_id(&metric_id, "metric")?;
    let found = repo::delete(&state.db, &identity.uid, metric_id)
        .await
        .or_internal("Failed to delete health metric")?;
    if !found {
        return Err(ApiError::not_found("Health metric not found"));
    }
    Ok(Json(MessageResponse::new("Health metric deleted successfully")))
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn bare_end_date_covers_the_whole_day() {
        let (from, to) = time_window("2024-01-01", "2024-01-07").unwrap();
        assert_eq!(from, datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(to, datetime!(2024-01-07 23:59:59.999999 UTC));
    }

    #[test]
    fn explicit_timestamps_are_used_as_is() {
        let (from, to) = time_window("2024-01-01T06:00:00Z", "2024-01-01T18:00:00Z").unwrap();
        assert_eq!(from, datetime!(2024-01-01 06:00:00 UTC));
        assert_eq!(to, datetime!(2024-01-01 18:00:00 UTC));
    }

    #[test]
    fn last_representable_day_does_not_overflow() {
        let (_, to) = time_window("2024-01-01", "9999-12-31").unwrap();
        assert_eq!(to, datetime!(9999-12-31 23:59:59.999999 UTC));
    }

    #[test]
    fn rejects_inverted_or_garbage_windows() {
        assert!(time_window("2024-02-01", "2024-01-01").is_err());
        assert!(time_window("soon", "2024-01-01").is_err());
    }

    #[tokio::test]
    async fn colliding_metric_update_is_a_bad_request() {
        use std::sync::Arc;

        use axum::{
            body::Body,
            http::{header, Method, Request},
        };
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        use crate::{
            app::build_app,
            db::{seed_user, test_pool},
            state::testing::{bearer, state_with, RecordingPush},
        };

        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;
        let at = |hour| NewMetric {
            metric_type: "weight".into(),
            value: 70.0,
            unit: "kg".into(),
            recorded_at: datetime!(2024-02-01 00:00:00 UTC) + time::Duration::hours(hour),
            source: MANUAL_SOURCE.into(),
        };
        repo::insert(&db, user_id, &at(7)).await.unwrap();
        let other = repo::insert(&db, user_id, &at(8)).await.unwrap();

        let app = build_app(state_with(db, Arc::new(RecordingPush::default())));
        let req = Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/health/metrics/{}", other.id))
            .header(header::AUTHORIZATION, bearer(&uid))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"recordedAt":"2024-02-01T07:00:00Z"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"]["message"].as_str().unwrap().contains("already exists"));
    }
}
