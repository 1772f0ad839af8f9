//! Channel subscription multiplexing.
//!
//! One provider subscription per distinct channel name, shared by every
//! call site interested in that chat. An explicit handler map keyed by a
//! counter id does the reference counting; the provider is unsubscribed
//! exactly when the last handler for a channel is removed. All failures on
//! this path degrade to a no-op guard so UI code never has to catch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::channel::channel_name;
use crate::client::connection::ConnectionManager;
use crate::realtime::transport::ChannelEvent;
use crate::realtime::Grant;

/// Performs the private-channel handshake against the server.
pub trait ChannelAuthorizer: Send + Sync {
    fn authorize(&self, credential: &str, socket_id: &str, channel: &str) -> Result<Grant, AuthorizeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("handshake denied")]
    Denied,
    #[error("handshake transport: {0}")]
    Transport(String),
}

impl<F> ChannelAuthorizer for F
where
    F: Fn(&str, &str, &str) -> Result<Grant, AuthorizeError> + Send + Sync,
{
    fn authorize(&self, credential: &str, socket_id: &str, channel: &str) -> Result<Grant, AuthorizeError> {
        self(credential, socket_id, channel)
    }
}

type Handler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;
type HandlerMap = Arc<Mutex<HashMap<u64, Handler>>>;

struct ChannelSub {
    handlers: HandlerMap,
    pump: tokio::task::JoinHandle<()>,
    /// Connection generation this subscription was opened under.
    generation: u64,
}

pub struct Multiplexer {
    inner: Arc<MuxInner>,
}

struct MuxInner {
    conn: Arc<ConnectionManager>,
    authorizer: Arc<dyn ChannelAuthorizer>,
    channels: Mutex<HashMap<String, ChannelSub>>,
    next_handler_id: AtomicU64,
}

impl Multiplexer {
    pub fn new(conn: Arc<ConnectionManager>, authorizer: Arc<dyn ChannelAuthorizer>) -> Self {
        Self {
            inner: Arc::new(MuxInner {
                conn,
                authorizer,
                channels: Mutex::new(HashMap::new()),
                next_handler_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to the chat between the two given role profiles. Argument
    /// order does not matter; both sides derive the same channel name.
    ///
    /// Returns an idempotent guard that detaches only this handler;
    /// removing the last handler closes the provider subscription.
    /// While disconnected this is a no-op and the guard does nothing.
    pub fn subscribe_to_chat(
        &self,
        chat_id: i64,
        profile_a: i64,
        profile_b: i64,
        on_message: impl Fn(ChannelEvent) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let Some((credential, socket_id, transport)) = self.inner.conn.current() else {
            tracing::debug!(chat_id, "subscribe while disconnected, returning no-op");
            return Unsubscribe::noop();
        };
        let generation = self.inner.conn.generation();
        let channel = channel_name(profile_a, profile_b);

        let mut channels = self.inner.channels.lock().unwrap();
        Self::sweep_stale(&mut channels, generation);

        if !channels.contains_key(&channel) {
            if let Err(err) = self.inner.authorizer.authorize(&credential, &socket_id, &channel) {
                tracing::warn!(chat_id, %channel, error = %err, "channel handshake failed");
                return Unsubscribe::noop();
            }
            let rx = match transport.subscribe(&channel) {
                Ok(rx) => rx,
                Err(err) => {
                    tracing::warn!(chat_id, %channel, error = %err, "channel subscribe failed");
                    return Unsubscribe::noop();
                }
            };

            let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
            let pump = tokio::spawn(pump_events(rx, handlers.clone()));
            channels.insert(channel.clone(), ChannelSub { handlers, pump, generation });
            tracing::debug!(chat_id, %channel, "channel subscription opened");
        }

        let sub = channels.get(&channel).expect("just inserted or present");
        let handler_id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        sub.handlers.lock().unwrap().insert(handler_id, Arc::new(on_message));

        Unsubscribe {
            target: Some(UnsubscribeTarget {
                mux: self.inner.clone(),
                channel,
                handler_id,
            }),
            done: AtomicBool::new(false),
        }
    }

    /// Number of live provider subscriptions, for leak checks.
    pub fn active_channels(&self) -> usize {
        self.inner.channels.lock().unwrap().len()
    }

    /// Drop every subscription opened under an older connection. Pump tasks
    /// tied to the dead transport are aborted rather than kept as borrows
    /// across the teardown.
    fn sweep_stale(channels: &mut HashMap<String, ChannelSub>, generation: u64) {
        channels.retain(|channel, sub| {
            let live = sub.generation == generation;
            if !live {
                tracing::debug!(%channel, "dropping stale channel subscription");
                sub.pump.abort();
            }
            live
        });
    }
}

async fn pump_events(
    mut rx: tokio::sync::broadcast::Receiver<ChannelEvent>,
    handlers: HandlerMap,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                // Snapshot outside the lock; a handler may re-enter the mux.
                let snapshot: Vec<Handler> = handlers.lock().unwrap().values().cloned().collect();
                for handler in snapshot {
                    handler(event.clone());
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "channel receiver lagged, events dropped");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

struct UnsubscribeTarget {
    mux: Arc<MuxInner>,
    channel: String,
    handler_id: u64,
}

/// Teardown guard returned by [`Multiplexer::subscribe_to_chat`]. Calling
/// [`Unsubscribe::unsubscribe`] twice is harmless; dropping the guard
/// without calling it also detaches the handler.
pub struct Unsubscribe {
    target: Option<UnsubscribeTarget>,
    done: AtomicBool,
}

impl Unsubscribe {
    fn noop() -> Self {
        Self { target: None, done: AtomicBool::new(true) }
    }

    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(target) = &self.target else { return };

        let mut channels = target.mux.channels.lock().unwrap();
        let Some(sub) = channels.get(&target.channel) else {
            return;
        };

        let remaining = {
            let mut handlers = sub.handlers.lock().unwrap();
            handlers.remove(&target.handler_id);
            handlers.len()
        };

        if remaining == 0 {
            let sub = channels.remove(&target.channel).expect("present above");
            sub.pump.abort();
            // Only tell the provider if this subscription's connection is
            // still the live one; a stale guard must not touch a newer
            // connection's channels.
            if sub.generation == target.mux.conn.generation() {
                if let Some((_, _, transport)) = target.mux.conn.current() {
                    transport.unsubscribe(&target.channel);
                }
            }
            tracing::debug!(channel = %target.channel, "channel subscription closed");
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
