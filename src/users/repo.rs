use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::{
    dto::{GoalRequest, UpdateProfileRequest},
    repo_types::{Goal, UserProfile},
};

const GOAL_COLUMNS: &str = "g.id, g.user_id, g.goal_type, g.target_value, g.target_date, \
    g.daily_calories, g.daily_protein, g.daily_carbs, g.daily_fats, g.is_active, \
    g.created_at, g.updated_at";

/// Map an external identity to the internal user id.
pub async fn resolve_user_id(db: &PgPool, firebase_uid: &str) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM users WHERE firebase_uid = $1"#)
        .bind(firebase_uid)
        .fetch_optional(db)
        .await
        .context("resolve user id")?;
    Ok(id)
}

pub async fn get_profile(db: &PgPool, firebase_uid: &str) -> anyhow::Result<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT u.id, u.firebase_uid, u.email, u.display_name, u.created_at,
               up.age, up.gender, up.height, up.weight, up.activity_level
        FROM users u
        LEFT JOIN user_profiles up ON u.id = up.user_id
        WHERE u.firebase_uid = $1
        "#,
    )
    .bind(firebase_uid)
    .fetch_optional(db)
    .await
    .context("get profile")?;
    Ok(profile)
}

/// Display name and profile row change together or not at all.
pub async fn update_profile(
    db: &PgPool,
    user_id: Uuid,
    req: &UpdateProfileRequest,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await.context("begin tx")?;

    if let Some(name) = req.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        sqlx::query(r#"UPDATE users SET display_name = $1, updated_at = NOW() WHERE id = $2"#)
            .bind(name)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("update display name")?;
    }

    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, age, gender, height, weight, activity_level, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            age            = COALESCE(EXCLUDED.age, user_profiles.age),
            gender         = COALESCE(EXCLUDED.gender, user_profiles.gender),
            height         = COALESCE(EXCLUDED.height, user_profiles.height),
            weight         = COALESCE(EXCLUDED.weight, user_profiles.weight),
            activity_level = COALESCE(EXCLUDED.activity_level, user_profiles.activity_level),
            updated_at     = NOW()
        "#,
    )
    .bind(user_id)
    .bind(req.age)
    .bind(req.gender.as_deref())
    .bind(req.height)
    .bind(req.weight)
    .bind(req.activity_level.as_deref())
    .execute(&mut *tx)
    .await
    .context("upsert profile")?;

    tx.commit().await.context("commit tx")?;
    Ok(())
}

pub async fn list_active_goals(db: &PgPool, firebase_uid: &str) -> anyhow::Result<Vec<Goal>> {
    let sql = format!(
        r#"
        SELECT {GOAL_COLUMNS}
        FROM user_goals g
        INNER JOIN users u ON g.user_id = u.id
        WHERE u.firebase_uid = $1 AND g.is_active = TRUE
        ORDER BY g.created_at DESC
        "#
    );
    let goals = sqlx::query_as::<_, Goal>(&sql)
        .bind(firebase_uid)
        .fetch_all(db)
        .await
        .context("list goals")?;
    Ok(goals)
}

pub async fn create_goal(
    db: &PgPool,
    user_id: Uuid,
    goal_type: &str,
    req: &GoalRequest,
) -> anyhow::Result<Goal> {
    let goal = sqlx::query_as::<_, Goal>(
        r#"
        INSERT INTO user_goals AS g (user_id, goal_type, target_value, target_date,
                                     daily_calories, daily_protein, daily_carbs, daily_fats,
                                     is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, NOW(), NOW())
        RETURNING g.id, g.user_id, g.goal_type, g.target_value, g.target_date,
                  g.daily_calories, g.daily_protein, g.daily_carbs, g.daily_fats, g.is_active,
                  g.created_at, g.updated_at
        "#,
    )
    .bind(user_id)
    .bind(goal_type)
    .bind(req.target_value)
    .bind(req.target_date)
    .bind(req.daily_calories)
    .bind(req.daily_protein)
    .bind(req.daily_carbs)
    .bind(req.daily_fats)
    .fetch_one(db)
    .await
    .context("insert goal")?;
    Ok(goal)
}

pub async fn update_goal(
    db: &PgPool,
    firebase_uid: &str,
    goal_id: Uuid,
    req: &GoalRequest,
) -> anyhow::Result<Option<Goal>> {
    let sql = format!(
        r#"
        UPDATE user_goals g
        SET goal_type      = COALESCE($1, g.goal_type),
            target_value   = COALESCE($2, g.target_value),
            target_date    = COALESCE($3, g.target_date),
            daily_calories = COALESCE($4, g.daily_calories),
            daily_protein  = COALESCE($5, g.daily_protein),
            daily_carbs    = COALESCE($6, g.daily_carbs),
            daily_fats     = COALESCE($7, g.daily_fats),
            is_active      = COALESCE($8, g.is_active),
            updated_at     = NOW()
        FROM users u
        WHERE g.user_id = u.id AND u.firebase_uid = $9 AND g.id = $10
        RETURNING {GOAL_COLUMNS}
        "#
    );
    let goal = sqlx::query_as::<_, Goal>(&sql)
        .bind(req.goal_type.as_deref())
        .bind(req.target_value)
        .bind(req.target_date)
        .bind(req.daily_calories)
        .bind(req.daily_protein)
        .bind(req.daily_carbs)
        .bind(req.daily_fats)
        .bind(req.is_active)
        .bind(firebase_uid)
        .bind(goal_id)
        .fetch_optional(db)
        .await
        .context("update goal")?;
    Ok(goal)
}

/// Goals are soft-deleted: the row stays, `is_active` goes false.
pub async fn deactivate_goal(db: &PgPool, firebase_uid: &str, goal_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_goals g
        SET is_active = FALSE, updated_at = NOW()
        FROM users u
        WHERE g.user_id = u.id AND u.firebase_uid = $1 AND g.id = $2
        "#,
    )
    .bind(firebase_uid)
    .bind(goal_id)
    .execute(db)
    .await
    .context("deactivate goal")?;
    Ok(result.rows_affected() > 0)
}

/// Child rows go with the user through `ON DELETE CASCADE`.
pub async fn delete_account(db: &PgPool, firebase_uid: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(r#"DELETE FROM users WHERE firebase_uid = $1"#)
        .bind(firebase_uid)
        .execute(db)
        .await
        .context("delete user")?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{seed_user, test_pool},
        health::{repo as metrics, repo_types::NewMetric},
        meals::{dto::MealRequest, repo as meals},
    };
    use time::macros::{date, datetime};

    #[tokio::test]
    async fn profile_update_keeps_omitted_fields() {
        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;

        let first = UpdateProfileRequest {
            display_name: Some("Jane".into()),
            age: Some(31),
            weight: Some(64.5),
            ..Default::default()
        };
        update_profile(&db, user_id, &first).await.unwrap();
        let second = UpdateProfileRequest {
            height: Some(170.0),
            ..Default::default()
        };
        update_profile(&db, user_id, &second).await.unwrap();

        let profile = get_profile(&db, &uid).await.unwrap().unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Jane"));
        assert_eq!(profile.age, Some(31));
        assert_eq!(profile.weight, Some(64.5));
        assert_eq!(profile.height, Some(170.0));
        assert_eq!(profile.gender, None);
    }

    #[tokio::test]
    async fn goal_partial_update_and_deactivation() {
        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;

        let req = GoalRequest {
            target_value: Some(60.0),
            daily_calories: Some(1800.0),
            ..Default::default()
        };
        let goal = create_goal(&db, user_id, "weight_loss", &req).await.unwrap();
        assert!(goal.is_active);

        let patch = GoalRequest {
            daily_calories: Some(1700.0),
            ..Default::default()
        };
        let updated = update_goal(&db, &uid, goal.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.daily_calories, Some(1700.0));
        assert_eq!(updated.target_value, Some(60.0));
        assert_eq!(updated.goal_type, "weight_loss");

        assert!(deactivate_goal(&db, &uid, goal.id).await.unwrap());
        assert!(list_active_goals(&db, &uid).await.unwrap().is_empty());

        // someone else's goal id is invisible
        let (other_uid, _) = seed_user(&db).await;
        assert!(update_goal(&db, &other_uid, goal.id, &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_the_account_cascades() {
        let Some(db) = test_pool().await else { return };
        let (uid, user_id) = seed_user(&db).await;

        let meal = MealRequest {
            calories: Some(500.0),
            ..Default::default()
        };
        meals::create(&db, user_id, "Lunch", date!(2024 - 01 - 01), &meal)
            .await
            .unwrap();
        let metric = NewMetric {
            metric_type: "steps".into(),
            value: 1000.0,
            unit: "count".into(),
            recorded_at: datetime!(2024-01-01 08:00:00 UTC),
            source: "Manual".into(),
        };
        metrics::insert(&db, user_id, &metric).await.unwrap();

        assert!(delete_account(&db, &uid).await.unwrap());
        assert!(!delete_account(&db, &uid).await.unwrap());
        assert!(meals::list_by_user(&db, &uid, 50, 0).await.unwrap().is_empty());
        assert!(metrics::list(&db, &uid, None, 50, 0).await.unwrap().is_empty());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
