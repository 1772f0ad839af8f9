//! Client-side realtime layer: one managed connection per authenticated
//! session, with de-duplicated per-chat channel subscriptions on top.

mod connection;
mod subscription;

pub use connection::{Connect, ConnectionManager, ConnectionState};
pub use subscription::{AuthorizeError, ChannelAuthorizer, Multiplexer, Unsubscribe};
