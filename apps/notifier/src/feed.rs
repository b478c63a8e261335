//! Conversation feed: the notifier's only view of the messaging API.
//!
//! The trait seam exists so the poller can be driven by a scripted feed in
//! tests; `HttpConversationFeed` is the production implementation.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

pub const CONVERSATIONS_PATH: &str = "/api/messages/conversations";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// The slice of a conversation object the feed needs. The API returns more
/// fields (participants, previews); everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub unread_count: u32,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Source of the signed-in user's conversation list.
#[async_trait]
pub trait ConversationFeed: Send + Sync + 'static {
    async fn conversations(&self, token: &str) -> Result<Vec<ConversationSummary>, FeedError>;
}

pub struct HttpConversationFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversationFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
        }
    }
}

#[async_trait]
impl ConversationFeed for HttpConversationFeed {
    async fn conversations(&self, token: &str) -> Result<Vec<ConversationSummary>, FeedError> {
        let url = format!("{}{}", self.base_url, CONVERSATIONS_PATH);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        response
            .json::<Vec<ConversationSummary>>()
            .await
            .map_err(|e| FeedError::Malformed(e.to_string()))
    }
}

/// Total unread across all conversations. Saturates instead of wrapping, so
/// the aggregate can never come out negative or small after overflow.
pub fn unread_total(conversations: &[ConversationSummary]) -> u64 {
    conversations
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(u64::from(c.unread_count)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries(counts: &[u32]) -> Vec<ConversationSummary> {
        counts
            .iter()
            .map(|&unread_count| ConversationSummary {
                id: Uuid::new_v4(),
                unread_count,
            })
            .collect()
    }

    #[test]
    fn test_unread_total_sums_counts() {
        assert_eq!(unread_total(&summaries(&[3, 0, 97])), 100);
    }

    #[test]
    fn test_unread_total_empty_is_zero() {
        assert_eq!(unread_total(&[]), 0);
    }

    #[test]
    fn test_unread_total_large_counts() {
        assert_eq!(
            unread_total(&summaries(&[u32::MAX, u32::MAX])),
            u64::from(u32::MAX) * 2
        );
    }

    #[test]
    fn test_summary_decodes_wire_shape() {
        let body = r#"[{"id":"7f2c9a40-0b1e-4a57-9a6f-1f4d3c2b1a00",
                        "participants":[{"id":"7f2c9a40-0b1e-4a57-9a6f-1f4d3c2b1a01","username":"bob"}],
                        "unreadCount":4,
                        "lastMessage":null,
                        "createdAt":"2025-03-01T00:00:00Z"}]"#;
        let parsed: Vec<ConversationSummary> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].unread_count, 4);
    }

    #[test]
    fn test_summary_rejects_missing_unread_count() {
        let body = r#"[{"id":"7f2c9a40-0b1e-4a57-9a6f-1f4d3c2b1a00"}]"#;
        assert!(serde_json::from_str::<Vec<ConversationSummary>>(body).is_err());
    }
}
