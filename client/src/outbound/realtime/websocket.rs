//! Socket.IO over a persistent WebSocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use super::codec::{EnginePacket, OpenHandshake};
use super::protocol::{
    Command, Reaction, connect_outcome, connect_packet, disconnect_packet, endpoint, event_packet,
    expect_open, react,
};
use crate::domain::ports::{
    EventListeners, EventSubscription, RealtimeTransport, TransportError, TransportProtocol,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open connection using the `websocket` sub-protocol.
pub struct WebSocketTransport {
    commands: mpsc::UnboundedSender<Command>,
    listeners: EventListeners,
    closed: bool,
}

impl WebSocketTransport {
    /// Handshake with the server at `origin`, sending cookies from `jar`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the socket cannot be opened, the
    /// handshake is malformed, or the namespace connect is refused.
    pub async fn open(
        origin: &Url,
        jar: &Arc<Jar>,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = endpoint(origin, TransportProtocol::WebSocket, None)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|error| TransportError::connect(error.to_string()))?;
        let cookie = jar
            .cookies(origin)
            .and_then(|cookies| HeaderValue::from_bytes(cookies.as_bytes()).ok());
        if let Some(cookie) = cookie {
            request.headers_mut().insert(COOKIE, cookie);
        }

        let (mut socket, _response) = timeout(handshake_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::connect("websocket handshake timed out"))?
            .map_err(|error| TransportError::connect(error.to_string()))?;

        let handshake = timeout(handshake_timeout, negotiate(&mut socket))
            .await
            .map_err(|_| TransportError::connect("realtime namespace connect timed out"))??;

        debug!(sid = %handshake.sid, "websocket transport open");
        let listeners = EventListeners::default();
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drive(
            socket,
            receiver,
            listeners.clone(),
            handshake.liveness_window(),
        ));
        Ok(Self {
            commands,
            listeners,
            closed: false,
        })
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::WebSocket
    }

    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::closed());
        }
        self.commands
            .send(Command::Send(event_packet(event, payload)))
            .map_err(|_| TransportError::closed())
    }

    fn subscribe(&mut self, event: &str) -> Result<EventSubscription, TransportError> {
        self.listeners.register(event)
    }

    fn unsubscribe(&mut self, subscription: EventSubscription) {
        self.listeners.remove(subscription);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.commands.send(Command::Close).is_err() {
            debug!("websocket transport already stopped");
        }
        self.listeners.clear();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read the open packet, then join the default namespace.
async fn negotiate(socket: &mut Socket) -> Result<OpenHandshake, TransportError> {
    let open = expect_open(next_packet(socket).await?)?;
    send_packet(socket, &connect_packet()).await?;
    loop {
        let packet = next_packet(socket).await?;
        if let Some(outcome) = connect_outcome(&packet) {
            return outcome.map(|()| open);
        }
        if let EnginePacket::Ping(data) = packet {
            send_packet(socket, &EnginePacket::Pong(data)).await?;
        }
    }
}

async fn next_packet(socket: &mut Socket) -> Result<EnginePacket, TransportError> {
    loop {
        let frame = socket
            .next()
            .await
            .ok_or_else(TransportError::closed)?
            .map_err(|error| TransportError::connect(error.to_string()))?;
        match frame {
            Message::Text(text) => {
                return Ok(EnginePacket::decode(text.as_str())?);
            }
            Message::Close(_) => return Err(TransportError::closed()),
            _ => {}
        }
    }
}

async fn send_packet(socket: &mut Socket, packet: &EnginePacket) -> Result<(), TransportError> {
    socket
        .send(Message::Text(packet.encode().into()))
        .await
        .map_err(|error| TransportError::connect(error.to_string()))
}

/// Pump frames until the owner closes, the server leaves, or the liveness
/// window passes without traffic. Listeners are cleared on exit so
/// subscribers observe the loss.
async fn drive(
    mut socket: Socket,
    mut commands: mpsc::UnboundedReceiver<Command>,
    listeners: EventListeners,
    liveness: Duration,
) {
    let mut deadline = Instant::now() + liveness;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(packet)) => {
                    if let Err(error) = send_packet(&mut socket, &packet).await {
                        warn!(error = %error, "websocket send failed");
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(error) = send_packet(&mut socket, &disconnect_packet()).await {
                        debug!(error = %error, "websocket disconnect packet not sent");
                    }
                    if let Err(error) = socket.close(None).await {
                        debug!(error = %error, "websocket close handshake failed");
                    }
                    break;
                }
            },
            frame = socket.next() => {
                let Some(Ok(message)) = frame else {
                    debug!("websocket stream ended");
                    break;
                };
                deadline = Instant::now() + liveness;
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let packet = match EnginePacket::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(error) => {
                        debug!(error = %error, "undecodable engine packet");
                        continue;
                    }
                };
                match react(packet, &listeners) {
                    Reaction::Continue => {}
                    Reaction::Reply(reply) => {
                        if let Err(error) = send_packet(&mut socket, &reply).await {
                            warn!(error = %error, "websocket pong failed");
                            break;
                        }
                    }
                    Reaction::Disconnected => break,
                }
            }
            () = sleep_until(deadline) => {
                warn!("websocket silent past the ping window");
                break;
            }
        }
    }
    listeners.clear();
}
