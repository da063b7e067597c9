use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::notifications::{
    dto::UpdatePreferencesRequest,
    repo_types::{NotificationDevice, NotificationPreferences, NotificationRecord},
};

const DEVICE_COLUMNS: &str =
    "nd.id, nd.user_id, nd.push_token, nd.device_type, nd.is_active, nd.created_at, nd.updated_at";
const PREFERENCE_COLUMNS: &str = "np.user_id, np.meal_reminders, np.goal_reminders, \
    np.achievement_notifications, np.daily_summary, np.quiet_hours_start, np.quiet_hours_end, \
    np.updated_at";
const HISTORY_COLUMNS: &str = "nh.id, nh.user_id, nh.title, nh.body, nh.notification_type, \
    nh.data, nh.sent_at, nh.is_read, nh.read_at";

/// Tokens are unique across users: registering a known token moves it to
/// `user_id` and reactivates it.
pub async fn register_device(
    db: &PgPool,
    user_id: Uuid,
    push_token: &str,
    device_type: Option<&str>,
) -> anyhow::Result<NotificationDevice> {
    let sql = format!(
        r#"
        INSERT INTO notification_devices AS nd (user_id, push_token, device_type, is_active,
                                                created_at, updated_at)
        VALUES ($1, $2, $3, TRUE, NOW(), NOW())
        ON CONFLICT (push_token) DO UPDATE SET
            user_id     = EXCLUDED.user_id,
            device_type = COALESCE(EXCLUDED.device_type, nd.device_type),
            is_active   = TRUE,
            updated_at  = NOW()
        RETURNING {DEVICE_COLUMNS}
        "#
    );
    let device = sqlx::query_as::<_, NotificationDevice>(&sql)
        .bind(user_id)
        .bind(push_token)
        .bind(device_type)
        .fetch_one(db)
        .await
        .context("upsert device")?;
    Ok(device)
}

pub async fn deactivate_device(
    db: &PgPool,
    firebase_uid: &str,
    push_token: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE notification_devices nd
        SET is_active = FALSE, updated_at = NOW()
        FROM users u
        WHERE nd.user_id = u.id AND u.firebase_uid = $1 AND nd.push_token = $2
        "#,
    )
    .bind(firebase_uid)
    .bind(push_token)
    .execute(db)
    .await
    .context("deactivate device")?;
    Ok(result.rows_affected() > 0)
}

pub async fn active_tokens(db: &PgPool, firebase_uid: &str) -> anyhow::Result<Vec<String>> {
    let tokens = sqlx::query_scalar::<_, String>(
        r#"
        SELECT nd.push_token
        FROM notification_devices nd
        INNER JOIN users u ON nd.user_id = u.id
        WHERE u.firebase_uid = $1 AND nd.is_active = TRUE
        ORDER BY nd.created_at
        "#,
    )
    .bind(firebase_uid)
    .fetch_all(db)
    .await
    .context("list active devices")?;
    Ok(tokens)
}

pub async fn get_preferences(
    db: &PgPool,
    firebase_uid: &str,
) -> anyhow::Result<Option<NotificationPreferences>> {
    let sql = format!(
        r#"
        SELECT {PREFERENCE_COLUMNS}
        FROM notification_preferences np
        INNER JOIN users u ON np.user_id = u.id
        WHERE u.firebase_uid = $1
        "#
    );
    let prefs = sqlx::query_as::<_, NotificationPreferences>(&sql)
        .bind(firebase_uid)
        .fetch_optional(db)
        .await
        .context("get preferences")?;
    Ok(prefs)
}

/// First write seeds the row from the defaults; later writes only touch the
/// fields that were supplied.
pub async fn upsert_preferences(
    db: &PgPool,
    user_id: Uuid,
    req: &UpdatePreferencesRequest,
) -> anyhow::Result<NotificationPreferences> {
    let defaults = NotificationPreferences::default();
    let sql = format!(
        r#"
        INSERT INTO notification_preferences AS np
            (user_id, meal_reminders, goal_reminders, achievement_notifications,
             daily_summary, quiet_hours_start, quiet_hours_end, updated_at)
        VALUES ($1, COALESCE($2, $8), COALESCE($3, $9), COALESCE($4, $10),
                COALESCE($5, $11), $6, $7, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            meal_reminders            = COALESCE($2, np.meal_reminders),
            goal_reminders            = COALESCE($3, np.goal_reminders),
            achievement_notifications = COALESCE($4, np.achievement_notifications),
            daily_summary             = COALESCE($5, np.daily_summary),
            quiet_hours_start         = COALESCE($6, np.quiet_hours_start),
            quiet_hours_end           = COALESCE($7, np.quiet_hours_end),
            updated_at                = NOW()
        RETURNING {PREFERENCE_COLUMNS}
        "#
    );
    let prefs = sqlx::query_as::<_, NotificationPreferences>(&sql)
        .bind(user_id)
        .bind(req.meal_reminders)
        .bind(req.goal_reminders)
        .bind(req.achievement_notifications)
        .bind(req.daily_summary)
        .bind(req.quiet_hours_start)
        .bind(req.quiet_hours_end)
        .bind(defaults.meal_reminders)
        .bind(defaults.goal_reminders)
        .bind(defaults.achievement_notifications)
        .bind(defaults.daily_summary)
        .fetch_one(db)
        .await
        .context("upsert preferences")?;
    Ok(prefs)
}

pub async fn record_sent(
    db: &PgPool,
    firebase_uid: &str,
    title: &str,
    body: &str,
    notification_type: &str,
    data: Option<&serde_json::Value>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notification_history (user_id, title, body, notification_type, data, sent_at)
        SELECT u.id, $2, $3, $4, $5, NOW()
        FROM users u
        WHERE u.firebase_uid = $1
        "#,
    )
    .bind(firebase_uid)
    .bind(title)
    .bind(body)
    .bind(notification_type)
    .bind(data)
    .execute(db)
    .await
    .context("record notification")?;
    Ok(())
}

pub async fn history(
    db: &PgPool,
    firebase_uid: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<NotificationRecord>> {
    let sql = format!(
        r#"
        SELECT {HISTORY_COLUMNS}
        FROM notification_history nh
        INNER JOIN users u ON nh.user_id = u.id
        WHERE u.firebase_uid = $1
        ORDER BY nh.sent_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    let rows = sqlx::query_as::<_, NotificationRecord>(&sql)
        .bind(firebase_uid)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("notification history")?;
    Ok(rows)
}

pub async fn mark_read(
    db: &PgPool,
    firebase_uid: &str,
    notification_id: Uuid,
) -> anyhow::Result<Option<NotificationRecord>> {
    let sql = format!(
        r#"
        UPDATE notification_history nh
        SET is_read = TRUE, read_at = COALESCE(nh.read_at, NOW())
        FROM users u
        WHERE nh.user_id = u.id AND u.firebase_uid = $1 AND nh.id = $2
        RETURNING {HISTORY_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, NotificationRecord>(&sql)
        .bind(firebase_uid)
        .bind(notification_id)
        .fetch_optional(db)
        .await
        .context("mark notification read")?;
    Ok(row)
}
