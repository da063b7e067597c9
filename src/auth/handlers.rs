use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, UserEnvelope, VerifyResponse},
        extractors::AuthUser,
        repo_types::User,
    },
    envelope::MessageResponse,
    error::{ApiError, ApiResult, JsonBody, OrInternal},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Routes reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Routes that sit behind `require_auth`.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", get(verify))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserEnvelope>)> {
    payload.uid = payload.uid.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.uid.is_empty() {
        return Err(ApiError::bad_request("uid is required"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let user = User::create(&state.db, &payload.uid, &payload.email, display_name)
        .await
        .or_internal("Failed to register user")?
        .ok_or_else(|| {
            warn!(uid = %payload.uid, "identity already registered");
            ApiError::bad_request("User already exists")
        })?;

    info!(user_id = %user.id, uid = %user.firebase_uid, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            message: "User registered successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    let uid = payload.uid.trim();
    if uid.is_empty() {
        return Err(ApiError::bad_request("uid is required"));
    }

    let user = User::find_by_uid(&state.db, uid)
        .await
        .or_internal("Login failed")?
        .ok_or_else(|| {
            warn!(uid = %uid, "login for unknown identity");
            ApiError::not_found("User not found")
        })?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(UserEnvelope {
        message: "Login successful",
        user,
    }))
}

/// Token refresh belongs to the client SDK; the route only says so.
pub async fn refresh() -> Json<MessageResponse> {
    Json(MessageResponse::new(
        "Token refresh should be handled by Firebase SDK on client side",
    ))
}

#[instrument(skip_all)]
pub async fn verify(AuthUser(identity): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        message: "Token is valid",
        user: identity.claims,
    })
}

#[instrument(skip_all)]
pub async fn logout(AuthUser(identity): AuthUser) -> Json<MessageResponse> {
    info!(uid = %identity.uid, "user logged out");
    Json(MessageResponse::new("Logout successful"))
}
