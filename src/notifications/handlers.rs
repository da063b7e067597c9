use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    envelope::{MessageResponse, Pagination},
    error::{ApiError, ApiResult, JsonBody, OrInternal, QueryParams},
    notifications::{
        dto::{
            DeviceResponse, HistoryResponse, NotificationResponse, PreferencesResponse,
            RegisterDeviceRequest, TestNotificationResponse, UnregisterDeviceRequest,
            UpdatePreferencesRequest,
        },
        push::is_expo_push_token,
        repo,
        services::{self, SendError},
    },
    state::AppState,
    users::handlers::{parse_id, require_user_id},
};

const DEFAULT_PAGE: i64 = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/register-device", post(register_device))
        .route("/notifications/unregister-device", delete(unregister_device))
        .route(
            "/notifications/preferences",
            get(get_preferences).put(update_preferences),
        )
        .route("/notifications/test", post(send_test))
        .route("/notifications/history", get(history))
        .route("/notifications/:notification_id/read", put(mark_read))
}

#[instrument(skip_all)]
pub async fn register_device(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<RegisterDeviceRequest>,
) -> ApiResult<Json<DeviceResponse>> {
    let token = body.push_token.trim();
    if !is_expo_push_token(token) {
        return Err(ApiError::bad_request("Invalid Expo push token"));
    }
    let device_type = body
        .device_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let user_id = require_user_id(&state, &identity.uid).await?;
    let device = repo::register_device(&state.db, user_id, token, device_type)
        .await
        .or_internal("Failed to register device")?;
    info!(%user_id, device_id = %device.id, "push device registered");
    Ok(Json(DeviceResponse {
        message: "Device registered successfully",
        device,
    }))
}

#[instrument(skip_all)]
pub async fn unregister_device(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<UnregisterDeviceRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = body.push_token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("pushToken is required"));
    }
    let found = repo::deactivate_device(&state.db, &identity.uid, token)
        .await
        .or_internal("Failed to unregister device")?;
    if !found {
        return Err(ApiError::not_found("Device not found"));
    }
    Ok(Json(MessageResponse::new("Device unregistered successfully")))
}

#[instrument(skip_all)]
pub async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<PreferencesResponse>> {
    let preferences = repo::get_preferences(&state.db, &identity.uid)
        .await
        .or_internal("Failed to get notification preferences")?
        .unwrap_or_default();
    Ok(Json(PreferencesResponse {
        message: None,
        preferences,
    }))
}

#[instrument(skip_all)]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<UpdatePreferencesRequest>,
) -> ApiResult<Json<PreferencesResponse>> {
    let user_id = require_user_id(&state, &identity.uid).await?;
    let preferences = repo::upsert_preferences(&state.db, user_id, &body)
        .await
        .or_internal("Failed to update notification preferences")?;
    Ok(Json(PreferencesResponse {
        message: Some("Preferences updated successfully"),
        preferences,
    }))
}

#[instrument(skip_all)]
pub async fn send_test(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<TestNotificationResponse>> {
    let tickets = services::send_test_notification(&state.db, state.push.as_ref(), &identity.uid)
        .await
        .map_err(|e| match e {
            SendError::NoDevices => ApiError::not_found("No active devices found"),
            err @ SendError::Undelivered(_) => {
                ApiError::internal("Failed to send test notification", anyhow::Error::from(err))
            }
            SendError::Other(cause) => ApiError::internal("Failed to send test notification", cause),
        })?;
    if tickets.iter().any(|t| t.status != "ok") {
        warn!(uid = %identity.uid, "push provider returned error tickets");
    }
    Ok(Json(TestNotificationResponse {
        message: "Test notification sent successfully",
        tickets,
    }))
}

#[instrument(skip_all)]
pub async fn history(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> ApiResult<Json<HistoryResponse>> {
    let (limit, offset) = page.resolve(DEFAULT_PAGE);
    let notifications = repo::history(&state.db, &identity.uid, limit, offset)
        .await
        .or_internal("Failed to get notification history")?;
    Ok(Json(HistoryResponse { notifications }))
}

#[instrument(skip_all)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(notification_id): Path<String>,
) -> ApiResult<Json<NotificationResponse>> {
    let notification_id = parse_id(&notification_id, "notification")?;
    let notification = repo::mark_read(&state.db, &identity.uid, notification_id)
        .await
        .or_internal("Failed to mark notification as read")?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(NotificationResponse {
        message: "Notification marked as read",
        notification,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        app::build_app,
        db::{seed_user, test_pool},
        notifications::repo,
        state::testing::{bearer, state_with, RecordingPush},
    };

    async fn post(app: axum::Router, uri: &str, uid: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(uid))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_notification_reaches_active_devices_and_history() {
        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;
        let push = Arc::new(RecordingPush::default());
        let app = build_app(state_with(db.clone(), push.clone()));

        let (status, body) = post(app.clone(), "/api/notifications/test", &uid).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "No active devices found");

        let token = format!("ExponentPushToken[{}]", Uuid::new_v4());
        repo::register_device(&db, user_id, &token, Some("android"))
            .await
            .unwrap();

        let (status, body) = post(app, "/api/notifications/test", &uid).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Test notification sent successfully");
        assert_eq!(body["tickets"].as_array().unwrap().len(), 1);

        let sent = push.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0].to, token);
        assert_eq!(sent[0][0].title, "Test Notification");

        let history = repo::history(&db, &uid, 50, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notification_type, "test");
    }

    #[tokio::test]
    async fn unauthenticated_write_leaves_no_trace() {
        let Some(db) = test_pool().await else { return };
        let (uid, _) = seed_user(&db).await;
        let push = Arc::new(RecordingPush::default());
        let app = build_app(state_with(db.clone(), push.clone()));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/notifications/test")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        assert!(push.sent.lock().unwrap().is_empty());
        assert!(repo::history(&db, &uid, 50, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undelivered_test_notification_is_not_recorded() {
        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;
        let token = format!("ExponentPushToken[{}]", Uuid::new_v4());
        repo::register_device(&db, user_id, &token, None).await.unwrap();

        let push = Arc::new(RecordingPush {
            fail_tokens: vec![token],
            ..Default::default()
        });
        let app = build_app(state_with(db.clone(), push));

        let (status, body) = post(app, "/api/notifications/test", &uid).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Failed to send test notification");
        assert!(repo::history(&db, &uid, 50, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preference_update_reply() {
        let Some(db) = test_pool().await else { return };
        let (uid, _) = seed_user(&db).await;
        let app = build_app(state_with(db, Arc::new(RecordingPush::default())));

        let req = Request::builder()
            .method(Method::PUT)
            .uri("/api/notifications/preferences")
            .header(header::AUTHORIZATION, bearer(&uid))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"goalReminders":false}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Preferences updated successfully");
        assert_eq!(body["preferences"]["goal_reminders"], false);
        assert_eq!(body["preferences"]["meal_reminders"], true);
    }
}
