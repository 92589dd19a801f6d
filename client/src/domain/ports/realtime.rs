//! Driven port for the server-push realtime channel.
//!
//! A connector produces one transport per identity binding. Listeners are
//! registered through [`RealtimeTransport::subscribe`], which hands back an
//! [`EventSubscription`]; the owner returns it through
//! [`RealtimeTransport::unsubscribe`] before calling
//! [`RealtimeTransport::close`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::define_port_error;

define_port_error! {
    /// Errors raised by realtime transport adapters.
    pub enum TransportError {
        /// The connection could not be opened.
        Connect { message: String } => "realtime connection failed: {message}",
        /// The server refused the namespace connection.
        Refused { message: String } => "realtime connection refused: {message}",
        /// The handshake or a frame could not be understood.
        Protocol { message: String } => "realtime protocol error: {message}",
        /// The transport is already closed.
        Closed => "realtime transport is closed",
        /// A listener is already registered for the event.
        DuplicateListener { event: String } =>
            "a listener for '{event}' is already registered",
    }
}

/// Negotiable realtime sub-protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    /// Persistent full-duplex stream.
    WebSocket,
    /// HTTP long-polling fallback.
    Polling,
}

impl TransportProtocol {
    /// Wire name used in the `transport` query parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown realtime transport '{0}' (expected 'websocket' or 'polling')")]
pub struct UnknownTransportProtocol(pub String);

impl FromStr for TransportProtocol {
    type Err = UnknownTransportProtocol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "polling" => Ok(Self::Polling),
            other => Err(UnknownTransportProtocol(other.to_owned())),
        }
    }
}

/// Live registration of the single listener for one event.
#[derive(Debug)]
pub struct EventSubscription {
    event: String,
    token: u64,
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl EventSubscription {
    /// Event name this subscription listens to.
    pub fn event(&self) -> &str {
        self.event.as_str()
    }

    /// Wait for the next payload; `None` once the transport stops delivering.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

#[derive(Debug, Default)]
struct ListenerTable {
    next_token: u64,
    entries: HashMap<String, (u64, mpsc::UnboundedSender<Value>)>,
}

/// Shared listener table used by transports to fan inbound events out.
///
/// At most one listener exists per event name. Clearing the table drops every
/// sender so subscribers observe the end of the stream.
#[derive(Debug, Clone, Default)]
pub struct EventListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl EventListeners {
    fn lock(&self) -> MutexGuard<'_, ListenerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the listener for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DuplicateListener`] when one is already live.
    pub fn register(&self, event: &str) -> Result<EventSubscription, TransportError> {
        let mut table = self.lock();
        if table.entries.contains_key(event) {
            return Err(TransportError::duplicate_listener(event));
        }
        table.next_token = table.next_token.wrapping_add(1);
        let token = table.next_token;
        let (sender, receiver) = mpsc::unbounded_channel();
        table.entries.insert(event.to_owned(), (token, sender));
        Ok(EventSubscription {
            event: event.to_owned(),
            token,
            receiver,
        })
    }

    /// Remove the listener that `subscription` was issued for.
    pub fn remove(&self, subscription: EventSubscription) {
        let mut table = self.lock();
        let matches = table
            .entries
            .get(subscription.event())
            .is_some_and(|(token, _)| *token == subscription.token);
        if matches {
            table.entries.remove(subscription.event());
        }
    }

    /// Deliver `payload` to the listener for `event`; returns whether one took it.
    pub fn dispatch(&self, event: &str, payload: Value) -> bool {
        let table = self.lock();
        table
            .entries
            .get(event)
            .is_some_and(|(_, sender)| sender.send(payload).is_ok())
    }

    /// Drop every listener, ending their streams.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One open realtime connection.
///
/// Dropping a transport that was never closed must release the connection as
/// if [`RealtimeTransport::close`] had been called.
#[async_trait]
pub trait RealtimeTransport: Send {
    /// Protocol negotiated for this connection.
    fn protocol(&self) -> TransportProtocol;

    /// Send a named event with a JSON payload.
    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Register the listener for `event`.
    fn subscribe(&mut self, event: &str) -> Result<EventSubscription, TransportError>;

    /// Remove a listener previously returned by [`Self::subscribe`].
    fn unsubscribe(&mut self, subscription: EventSubscription);

    /// Close the connection. Returns once the close is issued.
    fn close(&mut self);
}

/// Factory for realtime connections.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Open a new connection to the realtime endpoint.
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, TransportError>;
}
