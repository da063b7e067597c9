use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::{claims::Claims, verifier::IdentityVerifier};
use crate::config::JwtConfig;

/// HS256 tokens signed with a shared secret. Used for local development and tests,
/// where no Firebase project is available.
#[derive(Clone)]
pub struct SharedSecretVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl SharedSecretVerifier {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }

    /// Issue a token for `uid`; the counterpart of what the mobile SDK would hand us.
    pub fn sign(&self, uid: &str, email: Option<&str>) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: uid.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            email: email.map(str::to_string),
            email_verified: None,
            name: None,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(uid = %uid, "local token signed");
        Ok(token)
    }
}

#[async_trait]
impl IdentityVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.sub.is_empty() {
            anyhow::bail!("token has an empty subject");
        }
        debug!(uid = %data.claims.sub, "local token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_verifier(secret: &str, issuer: &str, audience: &str) -> SharedSecretVerifier {
        SharedSecretVerifier::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    #[tokio::test]
    async fn sign_and_verify_token() {
        let keys = make_verifier("dev-secret", "test-issuer", "test-aud");
        let token = keys.sign("firebase-uid-1", Some("a@b.io")).expect("sign");
        let claims = keys.verify(&token).await.expect("verify token");
        assert_eq!(claims.sub, "firebase-uid-1");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.email.as_deref(), Some("a@b.io"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_verifier("same-secret", "good-iss", "good-aud");
        let bad_keys = make_verifier("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign("uid", None).expect("sign");
        assert!(bad_keys.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_signature() {
        let ours = make_verifier("secret-a", "iss", "aud");
        let theirs = make_verifier("secret-b", "iss", "aud");
        let token = theirs.sign("uid", None).expect("sign");
        assert!(ours.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_verifier("dev-secret", "iss", "aud");
        assert!(keys.verify("not.a.jwt").await.is_err());
    }
}
