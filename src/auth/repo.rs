use anyhow::Context;
use sqlx::PgPool;

use crate::auth::repo_types::User;

impl User {
    /// Find a user by external identity.
    pub async fn find_by_uid(db: &PgPool, firebase_uid: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, firebase_uid, email, display_name, created_at
            FROM users
            WHERE firebase_uid = $1
            "#,
        )
        .bind(firebase_uid)
        .fetch_optional(db)
        .await
        .context("find user by uid")?;
        Ok(user)
    }

    /// Insert a new user. Returns `None` when the identity is already registered.
    pub async fn create(
        db: &PgPool,
        firebase_uid: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (firebase_uid, email, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (firebase_uid) DO NOTHING
            RETURNING id, firebase_uid, email, display_name, created_at
            "#,
        )
        .bind(firebase_uid)
        .bind(email)
        .bind(display_name)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn second_registration_of_a_uid_is_refused() {
        let Some(db) = test_pool().await else { return };
        let uid = format!("test-{}", uuid::Uuid::new_v4());

        let first = User::create(&db, &uid, "dup@example.com", Some("Dup"))
            .await
            .unwrap();
        assert!(first.is_some());
        let second = User::create(&db, &uid, "dup@example.com", None).await.unwrap();
        assert!(second.is_none());

        let found = User::find_by_uid(&db, &uid).await.unwrap().unwrap();
        assert_eq!(found.display_name.as_deref(), Some("Dup"));
    }
}
