use serde::{Deserialize, Serialize};

/// Verified ID-token payload. `sub` is the external identity (Firebase uid).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,    // external identity id
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Caller identity attached to a request once its bearer token has been verified.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub claims: Claims,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub.clone(),
            claims,
        }
    }
}
