use std::collections::HashMap;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::conversation::{
    ConversationListRow, ConversationSummary, MessagePreview, ParticipantInfo, ParticipantRow,
};
use crate::models::message::MessageRow;

pub const MAX_MESSAGE_LEN: usize = 4000;

const LIST_CONVERSATIONS_SQL: &str = r#"
    SELECT c.id,
           cp.unread_count,
           c.created_at,
           lm.body AS last_message_body,
           lm.sender_id AS last_message_sender_id,
           lm.created_at AS last_message_at
    FROM conversations c
    JOIN conversation_participants cp
        ON cp.conversation_id = c.id AND cp.user_id = $1
    LEFT JOIN LATERAL (
        SELECT body, sender_id, created_at
        FROM messages m
        WHERE m.conversation_id = c.id
        ORDER BY m.created_at DESC
        LIMIT 1
    ) lm ON TRUE
"#;

/// Returns the user's conversations, most recently active first, each carrying
/// that user's unread counter and a last-message preview.
pub async fn list_conversations(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ConversationSummary>, AppError> {
    let sql = format!("{LIST_CONVERSATIONS_SQL} ORDER BY COALESCE(lm.created_at, c.created_at) DESC");
    let rows: Vec<ConversationListRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(pool).await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let participants = fetch_participants(pool, &ids).await?;

    Ok(shape_conversations(rows, participants))
}

/// Opens a direct conversation with another user, or returns the existing one.
pub async fn open_conversation(
    pool: &PgPool,
    user_id: Uuid,
    other_user_id: Uuid,
) -> Result<ConversationSummary, AppError> {
    if user_id == other_user_id {
        return Err(AppError::Validation(
            "Cannot open a conversation with yourself".to_string(),
        ));
    }

    let other: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(other_user_id)
        .fetch_optional(pool)
        .await?;
    if other.is_none() {
        return Err(AppError::NotFound(format!("User {other_user_id} not found")));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT cp.conversation_id
        FROM conversation_participants cp
        JOIN conversation_participants other
            ON other.conversation_id = cp.conversation_id AND other.user_id = $2
        WHERE cp.user_id = $1
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(other_user_id)
    .fetch_optional(pool)
    .await?;

    let conversation_id = match existing {
        Some((id,)) => id,
        None => {
            let id = Uuid::new_v4();
            let mut tx = pool.begin().await?;
            sqlx::query("INSERT INTO conversations (id) VALUES ($1)")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2), ($1, $3)",
            )
            .bind(id)
            .bind(user_id)
            .bind(other_user_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            info!("Opened conversation {id} between {user_id} and {other_user_id}");
            id
        }
    };

    get_summary(pool, user_id, conversation_id).await
}

/// Returns a conversation's messages, oldest first, and resets the viewer's
/// unread counter. Viewing is the acknowledgement that clears delivery state.
pub async fn view_messages(
    pool: &PgPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<Vec<MessageRow>, AppError> {
    ensure_participant(pool, user_id, conversation_id).await?;

    sqlx::query(
        "UPDATE conversation_participants SET unread_count = 0, last_read_at = now() WHERE conversation_id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?)
}

/// Appends a message and increments the unread counter of every other
/// participant, atomically.
pub async fn send_message(
    pool: &PgPool,
    user_id: Uuid,
    conversation_id: Uuid,
    body: &str,
) -> Result<MessageRow, AppError> {
    let body = validate_body(body)?;
    ensure_participant(pool, user_id, conversation_id).await?;

    let mut tx = pool.begin().await?;
    let row: MessageRow = sqlx::query_as(
        "INSERT INTO messages (id, conversation_id, sender_id, body) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(user_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE conversation_participants SET unread_count = unread_count + 1 WHERE conversation_id = $1 AND user_id <> $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(row)
}

/// Rejects empty and over-long message bodies; returns the trimmed body.
pub fn validate_body(body: &str) -> Result<&str, AppError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Message body must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message body exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(trimmed)
}

async fn get_summary(
    pool: &PgPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<ConversationSummary, AppError> {
    let sql = format!("{LIST_CONVERSATIONS_SQL} WHERE c.id = $2");
    let row: Option<ConversationListRow> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?;
    let row =
        row.ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;

    let participants = fetch_participants(pool, &[conversation_id]).await?;
    let mut shaped = shape_conversations(vec![row], participants);
    Ok(shaped.remove(0))
}

/// Non-participants get the same 404 as a missing conversation, so the
/// endpoint does not leak which conversation ids exist.
async fn ensure_participant(
    pool: &PgPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<(), AppError> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))
}

async fn fetch_participants(
    pool: &PgPool,
    conversation_ids: &[Uuid],
) -> Result<Vec<ParticipantRow>, AppError> {
    if conversation_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as::<_, ParticipantRow>(
        r#"
        SELECT cp.conversation_id, u.id AS user_id, u.username
        FROM conversation_participants cp
        JOIN users u ON u.id = cp.user_id
        WHERE cp.conversation_id = ANY($1)
        "#,
    )
    .bind(conversation_ids)
    .fetch_all(pool)
    .await?)
}

/// Joins list rows with their participant sets into wire-shaped summaries.
pub fn shape_conversations(
    rows: Vec<ConversationListRow>,
    participants: Vec<ParticipantRow>,
) -> Vec<ConversationSummary> {
    let mut by_conversation: HashMap<Uuid, Vec<ParticipantInfo>> = HashMap::new();
    for p in participants {
        by_conversation
            .entry(p.conversation_id)
            .or_default()
            .push(ParticipantInfo {
                id: p.user_id,
                username: p.username,
            });
    }

    rows.into_iter()
        .map(|row| {
            let last_message = match (
                row.last_message_body,
                row.last_message_sender_id,
                row.last_message_at,
            ) {
                (Some(body), Some(sender_id), Some(sent_at)) => Some(MessagePreview {
                    body,
                    sender_id,
                    sent_at,
                }),
                _ => None,
            };
            ConversationSummary {
                id: row.id,
                participants: by_conversation.remove(&row.id).unwrap_or_default(),
                unread_count: row.unread_count.max(0) as u32,
                last_message,
                created_at: row.created_at,
            }
        })
        .collect()
}
