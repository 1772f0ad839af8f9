//! Post-persistence broadcast of new messages.

use std::sync::Arc;

use crate::channel::channel_name;
use crate::chats::store::HydratedMessage;
use crate::realtime::transport::PubSub;

pub const NEW_MESSAGE_EVENT: &str = "new-message";

/// Pushes stored messages onto their chat's channel.
///
/// Callers invoke this strictly after the message is durable. A failed
/// publish is logged and swallowed: the recipient still sees the message on
/// the next history fetch, so the send request must not fail on its account.
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn PubSub>,
}

impl Broadcaster {
    pub fn new(transport: Arc<dyn PubSub>) -> Self {
        Self { transport }
    }

    pub fn broadcast_message(
        &self,
        coach_profile_id: i64,
        client_profile_id: i64,
        message: &HydratedMessage,
    ) {
        let channel = channel_name(coach_profile_id, client_profile_id);
        let data = match serde_json::to_value(message) {
            Ok(message) => serde_json::json!({ "message": message }),
            Err(err) => {
                tracing::warn!(%channel, error = %err, "broadcast payload serialization failed");
                return;
            }
        };

        if let Err(err) = self.transport.publish(&channel, NEW_MESSAGE_EVENT, data) {
            tracing::warn!(%channel, error = %err, "broadcast failed after persistence");
        }
    }
}
