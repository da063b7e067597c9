use serde::{Deserialize, Serialize};

use crate::auth::{claims::Claims, repo_types::User};

/// Request body for registration. Firebase has already created the account;
/// this only mirrors it into our database.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub email: String,
    pub display_name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
    pub user: Claims,
}
