use anyhow::Context;
use sqlx::PgPool;
use time::{Date, Duration};
use uuid::Uuid;

use crate::meals::{
    dto::MealRequest,
    repo_types::{DailySummary, DaySummary, Meal},
};

const MEAL_COLUMNS: &str = "m.id, m.user_id, m.meal_name, m.meal_type, m.meal_date, m.meal_time, \
    m.calories, m.protein, m.carbs, m.fats, m.fiber, m.notes, m.created_at, m.updated_at";

pub async fn list_by_user(
    db: &PgPool,
    firebase_uid: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Meal>> {
    let sql = format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals m
        INNER JOIN users u ON m.user_id = u.id
        WHERE u.firebase_uid = $1
        ORDER BY m.meal_date DESC, m.meal_time DESC NULLS LAST
        LIMIT $2 OFFSET $3
        "#
    );
    let rows = sqlx::query_as::<_, Meal>(&sql)
        .bind(firebase_uid)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list meals")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, firebase_uid: &str, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
    let sql = format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals m
        INNER JOIN users u ON m.user_id = u.id
        WHERE u.firebase_uid = $1 AND m.id = $2
        "#
    );
    let meal = sqlx::query_as::<_, Meal>(&sql)
        .bind(firebase_uid)
        .bind(meal_id)
        .fetch_optional(db)
        .await
        .context("get meal")?;
    Ok(meal)
}

pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    meal_name: &str,
    meal_date: Date,
    req: &MealRequest,
) -> anyhow::Result<Meal> {
    let sql = format!(
        r#"
        INSERT INTO meals AS m (user_id, meal_name, meal_type, meal_date, meal_time,
                                calories, protein, carbs, fats, fiber, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
        RETURNING {MEAL_COLUMNS}
        "#
    );
    let meal = sqlx::query_as::<_, Meal>(&sql)
        .bind(user_id)
        .bind(meal_name)
        .bind(req.meal_type.as_deref())
        .bind(meal_date)
        .bind(req.meal_time)
        .bind(req.calories)
        .bind(req.protein)
        .bind(req.carbs)
        .bind(req.fats)
        .bind(req.fiber)
        .bind(req.notes.as_deref())
        .fetch_one(db)
        .await
        .context("insert meal")?;
    Ok(meal)
}

pub async fn update(
    db: &PgPool,
    firebase_uid: &str,
    meal_id: Uuid,
    req: &MealRequest,
) -> anyhow::Result<Option<Meal>> {
    let sql = format!(
        r#"
        UPDATE meals m
        SET meal_name = COALESCE($1, m.meal_name),
            meal_type = COALESCE($2, m.meal_type),
            meal_date = COALESCE($3, m.meal_date),
            meal_time = COALESCE($4, m.meal_time),
            calories  = COALESCE($5, m.calories),
            protein   = COALESCE($6, m.protein),
            carbs     = COALESCE($7, m.carbs),
            fats      = COALESCE($8, m.fats),
            fiber     = COALESCE($9, m.fiber),
            notes     = COALESCE($10, m.notes),
            updated_at = NOW()
        FROM users u
        WHERE m.user_id = u.id AND u.firebase_uid = $11 AND m.id = $12
        RETURNING {MEAL_COLUMNS}
        "#
    );
    let meal = sqlx::query_as::<_, Meal>(&sql)
        .bind(req.meal_name.as_deref())
        .bind(req.meal_type.as_deref())
        .bind(req.meal_date)
        .bind(req.meal_time)
        .bind(req.calories)
        .bind(req.protein)
        .bind(req.carbs)
        .bind(req.fats)
        .bind(req.fiber)
        .bind(req.notes.as_deref())
        .bind(firebase_uid)
        .bind(meal_id)
        .fetch_optional(db)
        .await
        .context("update meal")?;
    Ok(meal)
}

pub async fn delete(db: &PgPool, firebase_uid: &str, meal_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM meals m
        USING users u
        WHERE m.user_id = u.id AND u.firebase_uid = $1 AND m.id = $2
        "#,
    )
    .bind(firebase_uid)
    .bind(meal_id)
    .execute(db)
    .await
    .context("delete meal")?;
    Ok(result.rows_affected() > 0)
}

/// Meals dated `start..=end`, newest first.
pub async fn list_by_date_range(
    db: &PgPool,
    firebase_uid: &str,
    start: Date,
    end: Date,
) -> anyhow::Result<Vec<Meal>> {
    let sql = format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals m
        INNER JOIN users u ON m.user_id = u.id
        WHERE u.firebase_uid = $1 AND m.meal_date BETWEEN $2 AND $3
        ORDER BY m.meal_date DESC, m.meal_time DESC NULLS LAST
        "#
    );
    let rows = sqlx::query_as::<_, Meal>(&sql)
        .bind(firebase_uid)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await
        .context("list meals by date range")?;
    Ok(rows)
}

pub async fn daily_summary(
    db: &PgPool,
    firebase_uid: &str,
    date: Date,
) -> anyhow::Result<DailySummary> {
    let summary = sqlx::query_as::<_, DailySummary>(
        r#"
        SELECT COUNT(m.id)     AS meal_count,
               SUM(m.calories) AS total_calories,
               SUM(m.protein)  AS total_protein,
               SUM(m.carbs)    AS total_carbs,
               SUM(m.fats)     AS total_fats,
               SUM(m.fiber)    AS total_fiber
        FROM meals m
        INNER JOIN users u ON m.user_id = u.id
        WHERE u.firebase_uid = $1 AND m.meal_date = $2
        "#,
    )
    .bind(firebase_uid)
    .bind(date)
    .fetch_one(db)
    .await
    .context("daily summary")?;
    Ok(summary)
}

/// Per-day totals for the seven days starting at `start`; days without meals are absent.
pub async fn weekly_summary(
    db: &PgPool,
    firebase_uid: &str,
    start: Date,
) -> anyhow::Result<Vec<DaySummary>> {
    let end = week_end(start)?;
    let rows = sqlx::query_as::<_, DaySummary>(
        r#"
        SELECT m.meal_date,
               COUNT(m.id)     AS meal_count,
               SUM(m.calories) AS total_calories,
               SUM(m.protein)  AS total_protein,
               SUM(m.carbs)    AS total_carbs,
               SUM(m.fats)     AS total_fats,
               SUM(m.fiber)    AS total_fiber
        FROM meals m
        INNER JOIN users u ON m.user_id = u.id
        WHERE u.firebase_uid = $1
          AND m.meal_date >= $2
          AND m.meal_date < $3
        GROUP BY m.meal_date
        ORDER BY m.meal_date
        "#,
    )
    .bind(firebase_uid)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("weekly summary")?;
    Ok(rows)
}

/// Exclusive upper bound of the week starting at `start`.
pub fn week_end(start: Date) -> anyhow::Result<Date> {
    start
        .checked_add(Duration::days(7))
        .context("week start out of range")
}
