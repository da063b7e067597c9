use std::{sync::Arc, time::Duration};

use sqlx::PgPool;
use tracing::info;

use crate::{
    auth::{firebase::FirebaseVerifier, jwt::SharedSecretVerifier, verifier::IdentityVerifier},
    config::{AppConfig, AuthMode},
    db,
    notifications::push::{ExpoPushClient, PushClient},
};

/// Process-wide services, built once in `main` and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub push: Arc<dyn PushClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let identity: Arc<dyn IdentityVerifier> = match config.auth_mode {
            AuthMode::Firebase => {
                info!(project = %config.firebase.project_id, "verifying firebase id tokens");
                Arc::new(FirebaseVerifier::new(http.clone(), &config.firebase))
            }
            AuthMode::Local => {
                info!("verifying locally signed tokens (AUTH_MODE=local)");
                Arc::new(SharedSecretVerifier::new(&config.jwt))
            }
        };
        let push = Arc::new(ExpoPushClient::new(http, &config.push)) as Arc<dyn PushClient>;

        Ok(Self {
            db,
            config,
            identity,
            push,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        identity: Arc<dyn IdentityVerifier>,
        push: Arc<dyn PushClient>,
    ) -> Self {
        Self {
            db,
            config,
            identity,
            push,
        }
    }
}
