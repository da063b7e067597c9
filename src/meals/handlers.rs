use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::Date;
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    envelope::{MessageResponse, Pagination},
    error::{ApiError, ApiResult, JsonBody, OrInternal, QueryParams},
    formats::parse_date,
    meals::{
        dto::{
            DailySummaryResponse, MealRequest, MealResponse, MealsResponse, WeeklySummaryResponse,
        },
        repo,
    },
    state::AppState,
    users::handlers::{parse_id, replacement_name, require_user_id},
};

const DEFAULT_PAGE: i64 = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route(
            "/meals/:meal_id",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/meals/date-range/:start_date/:end_date", get(meals_by_date_range))
        .route("/meals/summary/daily/:date", get(daily_summary))
        .route("/meals/summary/weekly/:start_date", get(weekly_summary))
}

fn date_param(raw: &str) -> ApiResult<Date> {
    parse_date(raw).ok_or_else(|| ApiError::bad_request("Invalid date, expected YYYY-MM-DD"))
}

#[instrument(skip_all)]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> ApiResult<Json<MealsResponse>> {
    let (limit, offset) = page.resolve(DEFAULT_PAGE);
    let meals = repo::list_by_user(&state.db, &identity.uid, limit, offset)
        .await
        .or_internal("Failed to get meals")?;
    Ok(Json(MealsResponse { meals }))
}

#[instrument(skip_all)]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(meal_id): Path<String>,
) -> ApiResult<Json<MealResponse>> {
    let meal_id = parse_id(&meal_id, "meal")?;
    let meal = repo::get(&state.db, &identity.uid, meal_id)
        .await
        .or_internal("Failed to get meal")?
        .ok_or_else(|| ApiError::not_found("Meal not found"))?;
    Ok(Json(MealResponse {
        message: None,
        meal,
    }))
}

#[instrument(skip_all)]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<MealRequest>,
) -> ApiResult<(StatusCode, Json<MealResponse>)> {
    let meal_name = body
        .meal_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("mealName is required"))?
        .to_string();
    let meal_date = body
        .meal_date
        .ok_or_else(|| ApiError::bad_request("mealDate is required"))?;

    let user_id = require_user_id(&state, &identity.uid).await?;
    let meal = repo::create(&state.db, user_id, &meal_name, meal_date, &body)
        .await
        .or_internal("Failed to create meal")?;

    info!(%user_id, meal_id = %meal.id, "meal created");
    Ok((
        StatusCode::CREATED,
        Json(MealResponse {
            message: Some("Meal created successfully"),
            meal,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(meal_id): Path<String>,
    JsonBody(mut body): JsonBody<MealRequest>,
) -> ApiResult<Json<MealResponse>> {
    let meal_id = parse_id(&meal_id, "meal")?;
    body.meal_name = replacement_name(body.meal_name.take(), "mealName")?;
    let meal = repo::update(&state.db, &identity.uid, meal_id, &body)
        .await
        .or_internal("Failed to update meal")?
        .ok_or_else(|| ApiError::not_found("Meal not found"))?;
    Ok(Json(MealResponse {
        message: Some("Meal updated successfully"),
        meal,
    }))
}

#[instrument(skip_all)]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(meal_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let meal_id = parse_id(&meal_id, "meal")?;
    let found = repo::delete(&state.db, &identity.uid, meal_id)
        .await
        .or_internal("Failed to delete meal")?;
    if !found {
        return Err(ApiError::not_found("Meal not found"));
    }
    Ok(Json(MessageResponse::new("Meal deleted successfully")))
}

#[instrument(skip_all)]
pub async fn meals_by_date_range(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((start, end)): Path<(String, String)>,
) -> ApiResult<Json<MealsResponse>> {
    let (start, end) = (date_param(&start)?, date_param(&end)?);
    if start > end {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }
    let meals = repo::list_by_date_range(&state.db, &identity.uid, start, end)
        .await
        .or_internal("Failed to get meals")?;
    Ok(Json(MealsResponse { meals }))
}

#[instrument(skip_all)]
pub async fn daily_summary(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(date): Path<String>,
) -> ApiResult<Json<DailySummaryResponse>> {
    let date = date_param(&date)?;
    let summary = repo::daily_summary(&state.db, &identity.uid, date)
        .await
        .or_internal("Failed to get daily summary")?;
    Ok(Json(DailySummaryResponse { summary }))
}

#[instrument(skip_all)]
pub async fn weekly_summary(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(start): Path<String>,
) -> ApiResult<Json<WeeklySummaryResponse>> {
    let start = date_param(&start)?;
    let summary = repo::weekly_summary(&state.db, &identity.uid, start)
        .await
        .or_internal("Failed to get weekly summary")?;
    Ok(Json(WeeklySummaryResponse { summary }))
}
