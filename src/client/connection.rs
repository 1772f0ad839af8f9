//! Client-side connection lifecycle.
//!
//! One manager owns at most one live transport connection per authenticated
//! session. The connection follows the credential: setting a credential
//! dials (tearing down any previous connection first), losing it
//! disconnects. Consumers observe the state through a `watch` channel
//! instead of catching errors; a transport drop only flips the flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::realtime::transport::{PubSub, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Dials the pub/sub provider with the session credential.
pub trait Connect: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn PubSub>, TransportError>;
}

impl<F> Connect for F
where
    F: Fn(&str) -> Result<Arc<dyn PubSub>, TransportError> + Send + Sync,
{
    fn connect(&self, credential: &str) -> Result<Arc<dyn PubSub>, TransportError> {
        self(credential)
    }
}

struct Active {
    credential: String,
    socket_id: String,
    transport: Arc<dyn PubSub>,
}

pub struct ConnectionManager {
    connector: Arc<dyn Connect>,
    active: Mutex<Option<Active>>,
    state_tx: watch::Sender<ConnectionState>,
    // Bumped on every teardown so borrowers can detect a stale connection.
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connect>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            active: Mutex::new(None),
            state_tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Observable connection-state flag for UI consumption.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The session became authenticated. Any prior connection is torn down
    /// before dialing, so credential changes never leak a duplicate.
    pub fn set_credential(&self, credential: &str) {
        let mut active = self.active.lock().unwrap();
        if active.take().is_some() {
            self.generation.fetch_add(1, Ordering::Release);
        }

        self.state_tx.send_replace(ConnectionState::Connecting);
        match self.connector.connect(credential) {
            Ok(transport) => {
                let socket_id = new_socket_id();
                tracing::debug!(%socket_id, "realtime transport connected");
                *active = Some(Active {
                    credential: credential.to_owned(),
                    socket_id,
                    transport,
                });
                self.state_tx.send_replace(ConnectionState::Connected);
            }
            Err(err) => {
                tracing::warn!(error = %err, "realtime connect failed");
                self.state_tx.send_replace(ConnectionState::Disconnected);
            }
        }
    }

    /// The session lost authentication (logout or credential expiry).
    pub fn clear_credential(&self) {
        self.teardown();
    }

    /// A transport-level disconnect event arrived from the provider.
    pub fn on_transport_disconnect(&self) {
        tracing::debug!("realtime transport dropped");
        self.teardown();
    }

    fn teardown(&self) {
        let mut active = self.active.lock().unwrap();
        if active.take().is_some() {
            self.generation.fetch_add(1, Ordering::Release);
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Borrow the live connection. `None` while disconnected. The returned
    /// transport must not be cached beyond the current generation.
    pub(crate) fn current(&self) -> Option<(String, String, Arc<dyn PubSub>)> {
        let active = self.active.lock().unwrap();
        active
            .as_ref()
            .map(|a| (a.credential.clone(), a.socket_id.clone(), a.transport.clone()))
    }
}

fn new_socket_id() -> String {
    // Same shape providers use: two dot-separated integers.
    format!("{}.{}", rand::random::<u32>(), rand::random::<u32>())
}
