//! Message send path: validate, persist, then best-effort broadcast.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::Identity;
use crate::chats::store::{self, HydratedMessage};
use crate::error::{AppError, AppResult};
use crate::rate_limit::RateLimiter;
use crate::realtime::Broadcaster;

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
}

pub async fn send_message(
    State(pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    State(limiter): State<RateLimiter>,
    identity: Identity,
    Path(chat_id): Path<i64>,
    Json(body): Json<SendMessageBody>,
) -> AppResult<(StatusCode, Json<HydratedMessage>)> {
    let message = send(&pool, &broadcaster, &limiter, identity, chat_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// The send operation without the HTTP layer.
///
/// Persistence failures abort the request; a failed broadcast does not,
/// because the message is already durable and history fetch will deliver it.
pub async fn send(
    pool: &SqlitePool,
    broadcaster: &Broadcaster,
    limiter: &RateLimiter,
    identity: Identity,
    chat_id: i64,
    content: &str,
) -> AppResult<HydratedMessage> {
    let chat = store::get_chat(pool, chat_id)
        .await?
        .ok_or(AppError::NotFound("chat"))?;

    if !store::is_participant(pool, &chat, identity).await? {
        return Err(AppError::Forbidden("not a participant of this chat"));
    }

    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("message content must not be blank"));
    }

    if !limiter.try_acquire(identity.user_id) {
        return Err(AppError::RateLimited);
    }

    let message = store::insert_message(pool, chat_id, identity.user_id, content).await?;
    broadcaster.broadcast_message(chat.coach_profile_id, chat.client_profile_id, &message);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::Role;
    use crate::db;
    use crate::realtime::transport::{ChannelEvent, InMemoryPubSub, PubSub, TransportError};

    /// Transport whose publish always fails, for isolation tests.
    struct DeadPubSub;

    impl PubSub for DeadPubSub {
        fn publish(&self, _: &str, _: &str, _: serde_json::Value) -> Result<(), TransportError> {
            Err(TransportError::Publish("provider outage".to_owned()))
        }

        fn subscribe(
            &self,
            _: &str,
        ) -> Result<tokio::sync::broadcast::Receiver<ChannelEvent>, TransportError> {
            Err(TransportError::Subscribe("provider outage".to_owned()))
        }

        fn unsubscribe(&self, _: &str) {}
    }

    async fn seeded() -> (SqlitePool, i64) {
        let pool = db::memory_pool().await;
        sqlx::query(
            "INSERT INTO users (id,display_name,role) VALUES
                (1,'Coach Ann','coach'),(2,'Client Bob','client'),(5,'Client Mallory','client')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO coach_profiles (id,user_id,approved) VALUES (3,1,1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO client_profiles (id,user_id) VALUES (7,2),(8,5)")
            .execute(&pool)
            .await
            .unwrap();
        let chat = store::find_or_create_chat(&pool, 3, 7).await.unwrap();
        (pool, chat.id)
    }

    fn coach() -> Identity {
        Identity { user_id: 1, role: Role::Coach }
    }

    #[tokio::test]
    async fn stored_message_is_broadcast_on_the_chat_channel() {
        let (pool, chat_id) = seeded().await;
        let bus = Arc::new(InMemoryPubSub::new());
        let mut rx = bus.subscribe("private-chat-3-7").unwrap();
        let broadcaster = Broadcaster::new(bus);
        let limiter = RateLimiter::unlimited();

        let message = send(&pool, &broadcaster, &limiter, coach(), chat_id, "hello").await.unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.sender_name, "Coach Ann");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event, "new-message");
        assert_eq!(ev.data["message"]["id"], serde_json::json!(message.id));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_send() {
        let (pool, chat_id) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(DeadPubSub));
        let limiter = RateLimiter::unlimited();

        let message = send(&pool, &broadcaster, &limiter, coach(), chat_id, "hello").await.unwrap();

        // Still durable and visible through history.
        let page = store::history_page(&pool, chat_id, 10, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, message.id);
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_persistence() {
        let (pool, chat_id) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(InMemoryPubSub::new()));
        let limiter = RateLimiter::unlimited();

        let err = send(&pool, &broadcaster, &limiter, coach(), chat_id, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let page = store::history_page(&pool, chat_id, 10, 0).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn content_is_trimmed() {
        let (pool, chat_id) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(InMemoryPubSub::new()));
        let limiter = RateLimiter::unlimited();

        let message = send(&pool, &broadcaster, &limiter, coach(), chat_id, "  hi there \n")
            .await
            .unwrap();
        assert_eq!(message.content, "hi there");
    }

    #[tokio::test]
    async fn non_participant_cannot_send() {
        let (pool, chat_id) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(InMemoryPubSub::new()));
        let limiter = RateLimiter::unlimited();
        let mallory = Identity { user_id: 5, role: Role::Client };

        let err = send(&pool, &broadcaster, &limiter, mallory, chat_id, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let page = store::history_page(&pool, chat_id, 10, 0).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn missing_chat_is_not_found() {
        let (pool, _) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(InMemoryPubSub::new()));
        let limiter = RateLimiter::unlimited();

        let err = send(&pool, &broadcaster, &limiter, coach(), 404, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn throttled_sender_is_rejected() {
        let (pool, chat_id) = seeded().await;
        let broadcaster = Broadcaster::new(Arc::new(InMemoryPubSub::new()));
        let limiter = RateLimiter::new(2, std::time::Duration::from_secs(60));

        send(&pool, &broadcaster, &limiter, coach(), chat_id, "one").await.unwrap();
        send(&pool, &broadcaster, &limiter, coach(), chat_id, "two").await.unwrap();
        let err = send(&pool, &broadcaster, &limiter, coach(), chat_id, "three").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited));
    }
}
