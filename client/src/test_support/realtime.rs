//! In-memory realtime connector that journals every transport call.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::domain::ports::{
    EventListeners, EventSubscription, RealtimeConnector, RealtimeTransport, TransportError,
    TransportProtocol,
};

/// One observable transport interaction. `connection` counts from zero in
/// the order connections were opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Open { connection: usize },
    Subscribe { connection: usize, event: String },
    Unsubscribe { connection: usize, event: String },
    Emit { connection: usize, event: String, payload: Value },
    Close { connection: usize },
}

struct Connection {
    listeners: EventListeners,
    closed: bool,
}

#[derive(Default)]
struct FakeState {
    journal: Vec<JournalEntry>,
    attempts: usize,
    failures_remaining: u32,
    connections: Vec<Connection>,
    gate: Option<Arc<Notify>>,
    emit_gate: Option<Arc<Notify>>,
    held_emits: usize,
}

/// Releases connect attempts held by [`FakeRealtime::hold_connects`].
pub struct ConnectGate(Arc<Notify>);

impl ConnectGate {
    pub fn release(&self) {
        self.0.notify_waiters();
    }
}

/// Releases emits held by [`FakeRealtime::hold_emits`] and stops holding new
/// ones.
pub struct EmitGate {
    fake: FakeRealtime,
    notify: Arc<Notify>,
}

impl EmitGate {
    pub fn release(&self) {
        self.fake.lock().emit_gate = None;
        self.notify.notify_waiters();
    }
}

/// Connector producing in-memory transports.
#[derive(Clone, Default)]
pub struct FakeRealtime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(_) => panic!("fake realtime mutex"),
        }
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    /// Make connect attempts wait until the returned gate is released.
    pub fn hold_connects(&self) -> ConnectGate {
        let notify = Arc::new(Notify::new());
        self.lock().gate = Some(Arc::clone(&notify));
        ConnectGate(notify)
    }

    /// Make emits wait, unrecorded, until the returned gate is released.
    pub fn hold_emits(&self) -> EmitGate {
        let notify = Arc::new(Notify::new());
        self.lock().emit_gate = Some(Arc::clone(&notify));
        EmitGate {
            fake: self.clone(),
            notify,
        }
    }

    /// Emits that have waited on an [`EmitGate`].
    pub fn held_emits(&self) -> usize {
        self.lock().held_emits
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.lock().journal.clone()
    }

    /// Connect calls made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn opens(&self) -> usize {
        self.count(|entry| matches!(entry, JournalEntry::Open { .. }))
    }

    pub fn closes(&self) -> usize {
        self.count(|entry| matches!(entry, JournalEntry::Close { .. }))
    }

    /// Payloads of every `join` emitted, in order.
    pub fn joins(&self) -> Vec<Value> {
        self.lock()
            .journal
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Emit { event, payload, .. } if event == "join" => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Connections neither closed by the client nor dropped by the server.
    pub fn open_connections(&self) -> usize {
        self.lock()
            .connections
            .iter()
            .filter(|connection| !connection.closed)
            .count()
    }

    /// Deliver an inbound event on the newest open connection.
    pub fn push_event(&self, event: &str, payload: Value) -> bool {
        let state = self.lock();
        state
            .connections
            .iter()
            .rev()
            .find(|connection| !connection.closed)
            .is_some_and(|connection| connection.listeners.dispatch(event, payload))
    }

    /// Simulate the server dropping the newest open connection.
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        if let Some(connection) = state
            .connections
            .iter_mut()
            .rev()
            .find(|connection| !connection.closed)
        {
            connection.listeners.clear();
        }
    }

    fn count(&self, predicate: impl Fn(&JournalEntry) -> bool) -> usize {
        self.lock().journal.iter().filter(|entry| predicate(entry)).count()
    }

    fn record(&self, entry: JournalEntry) {
        self.lock().journal.push(entry);
    }
}

#[async_trait]
impl RealtimeConnector for FakeRealtime {
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, TransportError> {
        let gate = {
            let mut state = self.lock();
            state.attempts += 1;
            state.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(TransportError::connect("scripted connect failure"));
        }
        let connection = state.connections.len();
        let listeners = EventListeners::default();
        state.connections.push(Connection {
            listeners: listeners.clone(),
            closed: false,
        });
        state.journal.push(JournalEntry::Open { connection });
        Ok(Box::new(FakeTransport {
            fake: self.clone(),
            connection,
            listeners,
            closed: false,
        }))
    }
}

struct FakeTransport {
    fake: FakeRealtime,
    connection: usize,
    listeners: EventListeners,
    closed: bool,
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::WebSocket
    }

    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::closed());
        }
        let gate = self.fake.lock().emit_gate.clone();
        if let Some(gate) = gate {
            let released = gate.notified();
            self.fake.lock().held_emits += 1;
            released.await;
        }
        self.fake.record(JournalEntry::Emit {
            connection: self.connection,
            event: event.to_owned(),
            payload,
        });
        Ok(())
    }

    fn subscribe(&mut self, event: &str) -> Result<EventSubscription, TransportError> {
        let subscription = self.listeners.register(event)?;
        self.fake.record(JournalEntry::Subscribe {
            connection: self.connection,
            event: event.to_owned(),
        });
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: EventSubscription) {
        self.fake.record(JournalEntry::Unsubscribe {
            connection: self.connection,
            event: subscription.event().to_owned(),
        });
        self.listeners.remove(subscription);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.listeners.clear();
        let mut state = self.fake.lock();
        if let Some(connection) = state.connections.get_mut(self.connection) {
            connection.closed = true;
        }
        state.journal.push(JournalEntry::Close {
            connection: self.connection,
        });
    }
}

impl Drop for FakeTransport {
    fn drop(&mut self) {
        self.close();
    }
}
