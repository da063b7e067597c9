use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    envelope::MessageResponse,
    error::{ApiError, ApiResult, JsonBody, OrInternal},
    state::AppState,
    users::{
        dto::{GoalRequest, GoalResponse, GoalsResponse, ProfileResponse, UpdateProfileRequest},
        repo,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/goals", get(list_goals).post(create_goal))
        .route("/users/goals/:goal_id", put(update_goal).delete(delete_goal))
        .route("/users/account", axum::routing::delete(delete_account))
}

/// Internal id of the caller; 404 when the identity was never registered.
pub async fn require_user_id(state: &AppState, uid: &str) -> ApiResult<Uuid> {
    repo::resolve_user_id(&state.db, uid)
        .await
        .or_internal("Failed to resolve user")?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {what} id")))
}

/// Trimmed replacement for a required text column in a partial update;
/// absent stays absent, blank is refused.
pub(crate) fn replacement_name(raw: Option<String>, field: &str) -> ApiResult<Option<String>> {
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some("") => Err(ApiError::bad_request(format!("{field} cannot be empty"))),
        Some(name) => Ok(Some(name.to_string())),
    }
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = repo::get_profile(&state.db, &identity.uid)
        .await
        .or_internal("Failed to get profile")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(ProfileResponse {
        message: None,
        user,
    }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let user_id = require_user_id(&state, &identity.uid).await?;
    repo::update_profile(&state.db, user_id, &body)
        .await
        .or_internal("Failed to update profile")?;
    let user = repo::get_profile(&state.db, &identity.uid)
        .await
        .or_internal("Failed to update profile")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(%user_id, "profile updated");
    Ok(Json(ProfileResponse {
        message: Some("Profile updated successfully"),
        user,
    }))
}

#[instrument(skip_all)]
pub async fn list_goals(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<GoalsResponse>> {
    let goals = repo::list_active_goals(&state.db, &identity.uid)
        .await
        .or_internal("Failed to get goals")?;
    Ok(Json(GoalsResponse { goals }))
}

#[instrument(skip_all)]
pub async fn create_goal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<GoalRequest>,
) -> ApiResult<(StatusCode, Json<GoalResponse>)> {
    let goal_type = body
        .goal_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("goalType is required"))?
        .to_string();
    let user_id = require_user_id(&state, &identity.uid).await?;
    let goal = repo::create_goal(&state.db, user_id, &goal_type, &body)
        .await
        .or_internal("Failed to set goals")?;
    info!(%user_id, goal_id = %goal.id, "goal created");
    Ok((
        StatusCode::CREATED,
        Json(GoalResponse {
            message: "Goal created successfully",
            goal,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn update_goal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(goal_id): Path<String>,
    JsonBody(mut body): JsonBody<GoalRequest>,
) -> ApiResult<Json<GoalResponse>> {
    let goal_id = parse_id(&goal_id, "goal")?;
    body.goal_type = replacement_name(body.goal_type.take(), "goalType")?;
    let goal = repo::update_goal(&state.db, &identity.uid, goal_id, &body)
        .await
        .or_internal("Failed to update goals")?
        .ok_or_else(|| ApiError::not_found("Goal not found"))?;
    Ok(Json(GoalResponse {
        message: "Goal updated successfully",
        goal,
    }))
}

#[instrument(skip_all)]
pub async fn delete_goal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(goal_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let goal_id = parse_id(&goal_id, "goal")?;
    let found = repo::deactivate_goal(&state.db, &identity.uid, goal_id)
        .await
        .or_internal("Failed to delete goal")?;
    if !found {
        return Err(ApiError::not_found("Goal not found"));
    }
    Ok(Json(MessageResponse::new("Goal deactivated successfully")))
}

#[instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    let found = repo::delete_account(&state.db, &identity.uid)
        .await
        .or_internal("Failed to delete account")?;
    if !found {
        return Err(ApiError::not_found("User not found"));
    }
    info!(uid = %identity.uid, "account deleted");
    Ok(Json(MessageResponse::new("Account deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_names_are_trimmed_or_refused() {
        assert_eq!(replacement_name(None, "goalType").unwrap(), None);
        assert_eq!(
            replacement_name(Some("  cut ".into()), "goalType").unwrap(),
            Some("cut".to_string())
        );
        let err = replacement_name(Some("   ".into()), "goalType").unwrap_err();
        assert_eq!(err.to_string(), "goalType cannot be empty");
    }
}
