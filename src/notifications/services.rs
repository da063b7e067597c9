use serde_json::json;
use sqlx::PgPool;

use super::{
    push::{dispatch, PushClient, PushMessage, PushTicket},
    repo,
};

pub const TEST_TITLE: &str = "Test Notification";
pub const TEST_BODY: &str = "This is a test notification from your dieting app!";

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no active devices")]
    NoDevices,
    #[error("push provider accepted none of {0} messages")]
    Undelivered(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub fn build_messages(
    tokens: &[String],
    title: &str,
    body: &str,
    data: &serde_json::Value,
) -> Vec<PushMessage> {
    tokens
        .iter()
        .map(|token| PushMessage {
            to: token.clone(),
            sound: Some("default".into()),
            title: title.to_string(),
            body: body.to_string(),
            data: Some(data.clone()),
        })
        .collect()
}

/// Push the fixed test message to every active device of the caller. History
/// is only written when the provider accepted at least one message.
pub async fn send_test_notification(
    db: &PgPool,
    push: &dyn PushClient,
    firebase_uid: &str,
) -> Result<Vec<PushTicket>, SendError> {
    let tokens = repo::active_tokens(db, firebase_uid).await?;
    if tokens.is_empty() {
        return Err(SendError::NoDevices);
    }

    let data = json!({ "type": "test" });
    let messages = build_messages(&tokens, TEST_TITLE, TEST_BODY, &data);
    let tickets = dispatch(push, &messages).await;
    if tickets.is_empty() {
        return Err(SendError::Undelivered(messages.len()));
    }

    repo::record_sent(db, firebase_uid, TEST_TITLE, TEST_BODY, "test", Some(&data)).await?;
    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_message_per_token() {
        let tokens = vec!["ExponentPushToken[a]".to_string(), "ExponentPushToken[b]".to_string()];
        let data = json!({ "type": "test" });
        let messages = build_messages(&tokens, TEST_TITLE, TEST_BODY, &data);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].to, "ExponentPushToken[b]");
        assert_eq!(messages[0].sound.as_deref(), Some("default"));
        assert_eq!(messages[0].data.as_ref().unwrap()["type"], "test");
    }
}
