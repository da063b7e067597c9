use serde::Deserialize;

pub const DEFAULT_FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Which identity verifier guards the protected routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Firebase ID tokens (RS256, Google JWKS).
    Firebase,
    /// HS256 tokens signed with `JWT_SECRET`; local development only.
    Local,
}

impl AuthMode {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "local" => Ok(Self::Local),
            other => anyhow::bail!("unknown AUTH_MODE `{other}` (expected firebase|local)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub jwks_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    pub url: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub auth_mode: AuthMode,
    pub firebase: FirebaseConfig,
    pub jwt: JwtConfig,
    pub push: PushConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let auth_mode = match std::env::var("AUTH_MODE") {
            Ok(raw) => AuthMode::parse(&raw)?,
            Err(_) => AuthMode::Firebase,
        };

        let firebase = FirebaseConfig {
            project_id: std::env::var("FIREBASE_PROJECT_ID").unwrap_or_default(),
            jwks_url: std::env::var("FIREBASE_JWKS_URL")
                .unwrap_or_else(|_| DEFAULT_FIREBASE_JWKS_URL.into()),
        };
        if auth_mode == AuthMode::Firebase && firebase.project_id.is_empty() {
            anyhow::bail!("FIREBASE_PROJECT_ID is required when AUTH_MODE=firebase");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "diet-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "diet-tracker-app".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        if auth_mode == AuthMode::Local && jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET is required when AUTH_MODE=local");
        }

        let push = PushConfig {
            url: std::env::var("EXPO_PUSH_URL").unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.into()),
            access_token: std::env::var("EXPO_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            auth_mode,
            firebase,
            jwt,
            push,
        })
    }
}
