use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, health, meals, notifications, state::AppState, users};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(&state))
        .merge(users::router(&state))
        .merge(meals::router(&state))
        .merge(health::router(&state))
        .merge(notifications::router(&state));

    Router::new()
        .nest("/api", api)
        .route("/health", get(liveness))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn liveness() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{bearer, fake};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn call(req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn liveness_probe_is_public() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        for uri in [
            "/api/users/profile",
            "/api/meals",
            "/api/health/metrics",
            "/api/notifications/history",
            "/api/auth/verify",
        ] {
            let req = Request::get(uri).body(Body::empty()).unwrap();
            let (status, body) = call(req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"]["message"], "No token provided");
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let req = Request::get("/api/meals")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn verify_echoes_claims() {
        let req = Request::get("/api/auth/verify")
            .header(header::AUTHORIZATION, bearer("uid-verify"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["sub"], "uid-verify");
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let (status, body) = call(post_json(
            "/api/auth/register",
            json!({ "email": "a@example.com" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].is_string());

        let (status, _) = call(post_json(
            "/api/auth/register",
            json!({ "uid": "u1", "email": "not-an-email" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn authenticated_input_errors_fail_before_sql() {
        let mut req = post_json("/api/notifications/register-device", json!({ "pushToken": "nope" }));
        req.headers_mut()
            .insert(header::AUTHORIZATION, bearer("uid-dev").parse().unwrap());
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid Expo push token");

        let mut req = post_json("/api/health/sync", json!({ "metrics": [] }));
        req.headers_mut()
            .insert(header::AUTHORIZATION, bearer("uid-dev").parse().unwrap());
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid metrics data");

        let req = Request::get("/api/meals/summary/daily/yesterday")
            .header(header::AUTHORIZATION, bearer("uid-dev"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::builder()
            .method(Method::PUT)
            .uri("/api/notifications/not-a-uuid/read")
            .header(header::AUTHORIZATION, bearer("uid-dev"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_query_string_uses_error_envelope() {
        for uri in [
            "/api/meals?limit=abc",
            "/api/health/metrics?offset=x",
            "/api/health/metrics/steps?limit=1.5",
            "/api/notifications/history?limit=-",
        ] {
            let req = Request::get(uri)
                .header(header::AUTHORIZATION, bearer("uid-query"))
                .body(Body::empty())
                .unwrap();
            let (status, body) = call(req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid query parameters"));
        }
    }

    #[tokio::test]
    async fn blank_names_are_refused_on_update() {
        let id = uuid::Uuid::new_v4();
        for (uri, body) in [
            (format!("/api/users/goals/{id}"), json!({ "goalType": "  " })),
            (format!("/api/meals/{id}"), json!({ "mealName": "" })),
        ] {
            let req = Request::builder()
                .method(Method::PUT)
                .uri(&uri)
                .header(header::AUTHORIZATION, bearer("uid-blank"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let (status, body) = call(req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"]["message"]
                .as_str()
                .unwrap()
                .ends_with("cannot be empty"));
        }
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let req = Request::get("/api/nope").body(Body::empty()).unwrap();
        let (status, _) = call(req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
