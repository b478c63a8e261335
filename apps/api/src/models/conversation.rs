use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One conversation joined against the requesting user's participant row and
/// its most recent message. Produced by the list query in `messaging::store`.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationListRow {
    pub id: Uuid,
    pub unread_count: i32,
    pub created_at: DateTime<Utc>,
    pub last_message_body: Option<String>,
    pub last_message_sender_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Participant row joined with the user's display fields.
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantRow {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

/// Wire shape for `GET /api/messages/conversations`.
/// `unreadCount` is scoped to the requesting user and is never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: Vec<ParticipantInfo>,
    pub unread_count: u32,
    pub last_message: Option<MessagePreview>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub body: String,
    pub sender_id: Uuid,
    pub sent_at: DateTime<Utc>,
}
