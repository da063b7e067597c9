use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::PushConfig;

/// Expo accepts at most this many messages per request.
pub const MAX_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Expo's per-message receipt of acceptance (not of delivery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushTicket {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[async_trait]
pub trait PushClient: Send + Sync {
    /// Submit one provider-sized chunk.
    async fn send_chunk(&self, chunk: &[PushMessage]) -> anyhow::Result<Vec<PushTicket>>;
}

pub struct ExpoPushClient {
    http: Client,
    url: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ExpoSendResponse {
    #[serde(default)]
    data: Vec<PushTicket>,
}

impl ExpoPushClient {
    pub fn new(http: Client, cfg: &PushConfig) -> Self {
        Self {
            http,
            url: cfg.url.clone(),
            access_token: cfg.access_token.clone(),
        }
    }
}

#[async_trait]
impl PushClient for ExpoPushClient {
    async fn send_chunk(&self, chunk: &[PushMessage]) -> anyhow::Result<Vec<PushTicket>> {
        let mut req = self.http.post(&self.url).json(chunk);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp: ExpoSendResponse = req
            .send()
            .await
            .context("expo push request")?
            .error_for_status()
            .context("expo push status")?
            .json()
            .await
            .context("decode expo push response")?;
        debug!(sent = chunk.len(), tickets = resp.data.len(), "expo chunk accepted");
        Ok(resp.data)
    }
}

pub fn is_expo_push_token(token: &str) -> bool {
    lazy_static! {
        static ref EXPO_TOKEN_RE: Regex =
            Regex::new(r"^(ExponentPushToken|ExpoPushToken)\[.+\]$").unwrap();
        static ref BARE_TOKEN_RE: Regex =
            Regex::new(r"(?i)^[a-z\d]{8}-[a-z\d]{4}-[a-z\d]{4}-[a-z\d]{4}-[a-z\d]{12}$").unwrap();
    }
    EXPO_TOKEN_RE.is_match(token) || BARE_TOKEN_RE.is_match(token)
}

pub fn chunk_messages(messages: &[PushMessage], size: usize) -> Vec<&[PushMessage]> {
    messages.chunks(size.max(1)).collect()
}

/// Send every chunk independently. A failed chunk is logged and skipped; the
/// tickets of the chunks that went through are returned.
pub async fn dispatch(push: &dyn PushClient, messages: &[PushMessage]) -> Vec<PushTicket> {
    let mut tickets = Vec::with_capacity(messages.len());
    for (i, chunk) in chunk_messages(messages, MAX_CHUNK_SIZE).into_iter().enumerate() {
        match push.send_chunk(chunk).await {
            Ok(mut t) => tickets.append(&mut t),
            Err(e) => error!(error = ?e, chunk = i, size = chunk.len(), "sending notification chunk failed"),
        }
    }
    tickets
}
