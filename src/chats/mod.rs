mod history;
mod msg;
mod new;
pub mod store;

pub use msg::{send, SendMessageBody};
pub use new::OpenChatBody;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::open_chat))
        .route("/{id}", get(new::get_chat))
        .route("/{id}/messages", post(msg::send_message).get(history::history))
}
