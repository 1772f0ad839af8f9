//! Lazy chat creation: a client opens a chat toward an approved coach.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::{Identity, Role};
use crate::chats::store::{self, Chat};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct OpenChatBody {
    pub coach_profile_id: i64,
}

/// `POST /chats` — find or create the chat between the calling client and
/// the named coach. Only client-role users initiate; the coach must be
/// approved before it can be contacted.
pub async fn open_chat(
    State(pool): State<SqlitePool>,
    identity: Identity,
    Json(body): Json<OpenChatBody>,
) -> AppResult<(StatusCode, Json<Chat>)> {
    if identity.role != Role::Client {
        return Err(AppError::Forbidden("only clients open chats"));
    }
    let Some(client_profile_id) = identity.profile_id(&pool).await? else {
        return Err(AppError::Forbidden("no client profile"));
    };

    match store::coach_approved(&pool, body.coach_profile_id).await? {
        None => return Err(AppError::NotFound("coach profile")),
        Some(false) => return Err(AppError::Forbidden("coach is not approved")),
        Some(true) => {}
    }

    let chat = store::find_or_create_chat(&pool, body.coach_profile_id, client_profile_id).await?;
    Ok((StatusCode::OK, Json(chat)))
}

/// `GET /chats/{id}` — chat metadata for a participant.
pub async fn get_chat(
    State(pool): State<SqlitePool>,
    identity: Identity,
    Path(chat_id): Path<i64>,
) -> AppResult<Json<Chat>> {
    let chat = store::get_chat(&pool, chat_id)
        .await?
        .ok_or(AppError::NotFound("chat"))?;
    if !store::is_participant(&pool, &chat, identity).await? {
        return Err(AppError::Forbidden("not a participant of this chat"));
    }
    Ok(Json(chat))
}
