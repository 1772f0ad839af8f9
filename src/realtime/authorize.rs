//! Subscription-authorization handshake.
//!
//! The transport's client library posts here before it is allowed to join a
//! private channel. Each request stands alone: validate the caller, parse
//! the channel name, check the caller's own role-profile id against the pair
//! embedded in the name, and only then sign a grant scoped to this one
//! (socket, channel) pair.

use axum::{extract::State, Form, Json};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::auth::Identity;
use crate::channel::parse_channel_name;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Application key pair for the pub/sub provider. The key is public and
/// identifies the app; the secret signs grants.
#[derive(Clone)]
pub struct AppCreds {
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct HandshakeForm {
    pub socket_id: String,
    pub channel_name: String,
}

/// Signed grant in the shape private-channel providers expect:
/// `key:hmac_sha256(secret, "socket_id:channel_name")`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Grant {
    pub auth: String,
}

pub async fn handshake(
    State(pool): State<SqlitePool>,
    State(creds): State<AppCreds>,
    identity: Identity,
    Form(form): Form<HandshakeForm>,
) -> AppResult<Json<Grant>> {
    let grant = authorize(&pool, &creds, identity, &form.socket_id, &form.channel_name).await?;
    Ok(Json(grant))
}

/// The handshake state machine, callable without the HTTP layer.
pub async fn authorize(
    pool: &SqlitePool,
    creds: &AppCreds,
    identity: Identity,
    socket_id: &str,
    channel: &str,
) -> AppResult<Grant> {
    let Some((lo, hi)) = parse_channel_name(channel) else {
        tracing::warn!(user_id = identity.user_id, %channel, "handshake for malformed channel");
        return Err(AppError::InvalidChannel(channel.to_owned()));
    };

    let Some(profile_id) = identity.profile_id(pool).await? else {
        tracing::warn!(user_id = identity.user_id, %channel, "handshake without a role profile");
        return Err(AppError::Forbidden("no role profile"));
    };

    if profile_id != lo && profile_id != hi {
        tracing::warn!(
            user_id = identity.user_id,
            profile_id,
            %channel,
            "handshake for a chat the caller is not in"
        );
        return Err(AppError::Forbidden("not a participant of this channel"));
    }

    Ok(sign_grant(creds, socket_id, channel))
}

fn sign_grant(creds: &AppCreds, socket_id: &str, channel: &str) -> Grant {
    let mut mac =
        HmacSha256::new_from_slice(creds.secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{socket_id}:{channel}").as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    Grant { auth: format!("{}:{sig}", creds.key) }
}
