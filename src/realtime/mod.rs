mod authorize;
mod publish;
pub mod transport;

pub use authorize::{authorize, AppCreds, Grant, HandshakeForm};
pub use publish::{Broadcaster, NEW_MESSAGE_EVENT};

use axum::{routing::post, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/auth", post(authorize::handshake))
}
