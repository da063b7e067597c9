use async_trait::async_trait;

use super::claims::Claims;

/// Turns a bearer token into verified claims, or fails.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims>;
}
