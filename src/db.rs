use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Pool for database-backed tests. `None` (and the test is skipped) unless
/// `DATABASE_URL` points at a reachable, disposable Postgres.
#[cfg(test)]
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .ok()?;
    migrate(&db).await.expect("migrations apply");
    Some(db)
}

/// Fresh registered user with a unique uid; returns `(uid, id)`.
#[cfg(test)]
pub async fn seed_user(db: &PgPool) -> (String, uuid::Uuid) {
    let uid = format!("test-{}", uuid::Uuid::new_v4());
    let user = crate::auth::repo_types::User::create(db, &uid, &format!("{uid}@example.com"), None)
        .await
        .expect("insert user")
        .expect("uid is unique");
    (uid, user.id)
}
