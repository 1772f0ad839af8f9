//! Chat and message rows plus the queries the handlers share.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::auth::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    pub coach_profile_id: i64,
    pub client_profile_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Message joined with its sender's display attributes, as returned to
/// callers and carried in broadcast payloads.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HydratedMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub created_at: i64,
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub async fn get_chat(pool: &SqlitePool, chat_id: i64) -> Result<Option<Chat>, sqlx::Error> {
    sqlx::query_as("SELECT id,coach_profile_id,client_profile_id,created_at,updated_at FROM chats WHERE id=?")
        .bind(chat_id)
        .fetch_optional(pool)
        .await
}

/// The chat for a (coach, client) profile pair, created on first use.
/// The UNIQUE constraint makes concurrent first contacts converge on one row.
pub async fn find_or_create_chat(
    pool: &SqlitePool,
    coach_profile_id: i64,
    client_profile_id: i64,
) -> Result<Chat, sqlx::Error> {
    let now = now_unix();
    sqlx::query(
        "INSERT OR IGNORE INTO chats (coach_profile_id,client_profile_id,created_at,updated_at)
         VALUES (?,?,?,?)",
    )
    .bind(coach_profile_id)
    .bind(client_profile_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as(
        "SELECT id,coach_profile_id,client_profile_id,created_at,updated_at
         FROM chats WHERE coach_profile_id=? AND client_profile_id=?",
    )
    .bind(coach_profile_id)
    .bind(client_profile_id)
    .fetch_one(pool)
    .await
}

/// Approval flag for a coach profile, `None` if the profile does not exist.
pub async fn coach_approved(
    pool: &SqlitePool,
    coach_profile_id: i64,
) -> Result<Option<bool>, sqlx::Error> {
    let row: Option<(bool,)> = sqlx::query_as("SELECT approved FROM coach_profiles WHERE id=?")
        .bind(coach_profile_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(approved,)| approved))
}

/// Whether the caller owns one of the chat's two role profiles. Role
/// decides which side to check, so a coach user whose coach profile happens
/// to share an id with the chat's client profile is still rejected.
pub async fn is_participant(
    pool: &SqlitePool,
    chat: &Chat,
    identity: Identity,
) -> Result<bool, sqlx::Error> {
    let Some(profile_id) = identity.profile_id(pool).await? else {
        return Ok(false);
    };
    Ok(match identity.role {
        Role::Coach => profile_id == chat.coach_profile_id,
        Role::Client => profile_id == chat.client_profile_id,
    })
}

/// Insert a message and return it hydrated with the sender's display name.
pub async fn insert_message(
    pool: &SqlitePool,
    chat_id: i64,
    sender_id: i64,
    content: &str,
) -> Result<HydratedMessage, sqlx::Error> {
    let now = now_unix();
    let result = sqlx::query("INSERT INTO messages (chat_id,sender_id,content,created_at) VALUES (?,?,?,?)")
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(now)
        .execute(pool)
        .await?;
    let message_id = result.last_insert_rowid();

    sqlx::query("UPDATE chats SET updated_at=? WHERE id=?")
        .bind(now)
        .bind(chat_id)
        .execute(pool)
        .await?;

    hydrated_message(pool, message_id).await
}

async fn hydrated_message(pool: &SqlitePool, message_id: i64) -> Result<HydratedMessage, sqlx::Error> {
    sqlx::query_as(
        "SELECT m.id,m.chat_id,m.sender_id,u.display_name AS sender_name,m.content,m.created_at
         FROM messages m JOIN users u ON u.id=m.sender_id
         WHERE m.id=?",
    )
    .bind(message_id)
    .fetch_one(pool)
    .await
}

/// One page of history, oldest-to-newest. Internally selects newest-first
/// for take/skip paging, then reverses the page.
pub async fn history_page(
    pool: &SqlitePool,
    chat_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<HydratedMessage>, sqlx::Error> {
    let mut page: Vec<HydratedMessage> = sqlx::query_as(
        "SELECT m.id,m.chat_id,m.sender_id,u.display_name AS sender_name,m.content,m.created_at
         FROM messages m JOIN users u ON u.id=m.sender_id
         WHERE m.chat_id=?
         ORDER BY m.created_at DESC, m.id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(chat_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    page.reverse();
    Ok(page)
}
