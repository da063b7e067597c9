use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::{header::CACHE_CONTROL, Client};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{claims::Claims, verifier::IdentityVerifier};
use crate::config::FirebaseConfig;

const DEFAULT_KEYS_TTL: Duration = Duration::from_secs(60 * 60);

struct CachedKeys {
    keys: JwkSet,
    expires_at: Instant,
}

/// Verifies Firebase ID tokens (RS256) against Google's published signing keys.
pub struct FirebaseVerifier {
    http: Client,
    jwks_url: String,
    project_id: String,
    issuer: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(http: Client, cfg: &FirebaseConfig) -> Self {
        Self {
            http,
            jwks_url: cfg.jwks_url.clone(),
            project_id: cfg.project_id.clone(),
            issuer: format!("https://securetoken.google.com/{}", cfg.project_id),
            cache: RwLock::new(None),
        }
    }

    /// Keys are fetched at most once per cache lifetime. An unknown `kid`
    /// against an unexpired cache is rejected without going to the network.
    async fn decoding_key(&self, kid: &str) -> anyhow::Result<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Instant::now()) {
                return find_key(&cached.keys, kid);
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Instant::now()) {
            return find_key(&cached.keys, kid);
        }
        let fresh = self.fetch_keys().await?;
        let key = find_key(&fresh.keys, kid);
        *cache = Some(fresh);
        key
    }

    async fn fetch_keys(&self) -> anyhow::Result<CachedKeys> {
        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .context("fetch firebase signing keys")?
            .error_for_status()
            .context("firebase signing keys endpoint")?;
        let ttl = resp
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(DEFAULT_KEYS_TTL);
        let keys: JwkSet = resp.json().await.context("decode firebase signing keys")?;
        info!(count = keys.keys.len(), ttl_secs = ttl.as_secs(), "firebase signing keys refreshed");
        Ok(CachedKeys {
            keys,
            expires_at: Instant::now() + ttl,
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let header = decode_header(token).context("malformed token header")?;
        if header.alg != Algorithm::RS256 {
            anyhow::bail!("unexpected token algorithm {:?}", header.alg);
        }
        let kid = header.kid.context("token has no key id")?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.project_id));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &key, &validation)?;
        if data.claims.sub.is_empty() {
            anyhow::bail!("token has an empty subject");
        }
        debug!(uid = %data.claims.sub, "firebase token verified");
        Ok(data.claims)
    }
}

fn find_key(keys: &JwkSet, kid: &str) -> anyhow::Result<DecodingKey> {
    let jwk = keys
        .find(kid)
        .with_context(|| format!("unknown signing key id {kid}"))?;
    Ok(DecodingKey::from_jwk(jwk)?)
}

/// `max-age` seconds from a `Cache-Control` header value.
fn max_age(header: &str) -> Option<Duration> {
    header
        .split(',')
        .filter_map(|part| part.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
