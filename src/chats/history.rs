//! Paginated message history, participant-only.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::Identity;
use crate::chats::store::{self, HydratedMessage};
use crate::error::{AppError, AppResult};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn history(
    State(pool): State<SqlitePool>,
    identity: Identity,
    Path(chat_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HydratedMessage>>> {
    let chat = store::get_chat(&pool, chat_id)
        .await?
        .ok_or(AppError::NotFound("chat"))?;

    if !store::is_participant(&pool, &chat, identity).await? {
        return Err(AppError::Forbidden("not a participant of this chat"));
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let page = store::history_page(&pool, chat_id, limit, offset).await?;
    Ok(Json(page))
}
