//! Socket.IO over HTTP long-polling.
//!
//! A reader task keeps exactly one GET outstanding and forwards decoded
//! packets to the driver, which answers pings and sends outbound packets by
//! POST. An in-flight GET must never be cancelled while the connection is
//! live, otherwise the server drops the session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, warn};

use super::codec::{EnginePacket, decode_payload, encode_payload};
use super::protocol::{
    Command, Reaction, connect_outcome, connect_packet, disconnect_packet, endpoint, event_packet,
    expect_open, react,
};
use crate::domain::ports::{
    EventListeners, EventSubscription, RealtimeTransport, TransportError, TransportProtocol,
};

/// Extra time allowed on a poll beyond the server's ping window.
const POLL_MARGIN: Duration = Duration::from_secs(5);

/// Open connection using the `polling` sub-protocol.
pub struct PollingTransport {
    commands: mpsc::UnboundedSender<Command>,
    listeners: EventListeners,
    closed: bool,
}

impl PollingTransport {
    /// Handshake with the server at `origin` using `client`, whose cookie jar
    /// carries the session.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when a request fails, the handshake is
    /// malformed, or the namespace connect is refused.
    pub async fn open(
        origin: &Url,
        client: &Client,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let deadline = Instant::now() + handshake_timeout;

        let handshake_url = endpoint(origin, TransportProtocol::Polling, None)?;
        let body = timeout_at(deadline, fetch(client, &handshake_url, handshake_timeout))
            .await
            .map_err(|_| TransportError::connect("polling handshake timed out"))??;
        let first = decode_payload(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::protocol("empty open payload"))?;
        let open = expect_open(first)?;

        let session_url = endpoint(origin, TransportProtocol::Polling, Some(&open.sid))?;
        deliver(client, &session_url, &[connect_packet()], handshake_timeout).await?;
        let backlog = timeout_at(
            deadline,
            await_connect(client, &session_url, handshake_timeout),
        )
        .await
        .map_err(|_| TransportError::connect("realtime namespace connect timed out"))??;

        debug!(sid = %open.sid, "polling transport open");
        let liveness = open.liveness_window();
        let listeners = EventListeners::default();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (inbound, packets) = mpsc::unbounded_channel();
        if !forward(backlog, &inbound) {
            warn!("polling backlog dropped before the driver started");
        }
        let reader = tokio::spawn(read_loop(
            client.clone(),
            session_url.clone(),
            liveness + POLL_MARGIN,
            inbound,
        ));
        let poster = Poster {
            client: client.clone(),
            url: session_url,
            timeout: handshake_timeout,
        };
        let driver_listeners = listeners.clone();
        tokio::spawn(async move {
            drive(poster, receiver, packets, driver_listeners, liveness).await;
            reader.abort();
        });
        Ok(Self {
            commands,
            listeners,
            closed: false,
        })
    }
}

#[async_trait]
impl RealtimeTransport for PollingTransport {
    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Polling
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
            debug!("polling transport already stopped");
        }
        self.listeners.clear();
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Poll until the namespace connect resolves. Packets that arrived after the
/// acknowledgement in the same payload are returned for the driver.
async fn await_connect(
    client: &Client,
    url: &Url,
    request_timeout: Duration,
) -> Result<Vec<EnginePacket>, TransportError> {
    loop {
        let body = fetch(client, url, request_timeout).await?;
        let mut packets = decode_payload(&body)?.into_iter();
        while let Some(packet) = packets.next() {
            match connect_outcome(&packet) {
                Some(Ok(())) => return Ok(packets.collect()),
                Some(Err(error)) => return Err(error),
                None => {
                    if let EnginePacket::Ping(data) = packet {
                        deliver(client, url, &[EnginePacket::Pong(data)], request_timeout).await?;
                    }
                }
            }
        }
    }
}

async fn fetch(client: &Client, url: &Url, request_timeout: Duration) -> Result<String, TransportError> {
    let response = client
        .get(url.clone())
        .timeout(request_timeout)
        .send()
        .await
        .map_err(|error| TransportError::connect(error.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::connect(format!(
            "polling request failed with status {status}"
        )));
    }
    response
        .text()
        .await
        .map_err(|error| TransportError::connect(error.to_string()))
}

async fn deliver(
    client: &Client,
    url: &Url,
    packets: &[EnginePacket],
    request_timeout: Duration,
) -> Result<(), TransportError> {
    let response = client
        .post(url.clone())
        .timeout(request_timeout)
        .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(encode_payload(packets))
        .send()
        .await
        .map_err(|error| TransportError::connect(error.to_string()))?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::connect(format!(
            "polling post failed with status {status}"
        )))
    }
}

/// Outbound half of a polling session.
struct Poster {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl Poster {
    async fn post(&self, packets: &[EnginePacket]) -> Result<(), TransportError> {
        deliver(&self.client, &self.url, packets, self.timeout).await
    }
}

/// Keep one long-poll outstanding, forwarding every decoded packet. Ends when
/// a poll fails or the driver stops listening.
async fn read_loop(
    client: Client,
    url: Url,
    poll_timeout: Duration,
    inbound: mpsc::UnboundedSender<EnginePacket>,
) {
    loop {
        let body = match fetch(&client, &url, poll_timeout).await {
            Ok(body) => body,
            Err(error) => {
                debug!(error = %error, "long-poll ended");
                return;
            }
        };
        let packets = match decode_payload(&body) {
            Ok(packets) => packets,
            Err(error) => {
                debug!(error = %error, "undecodable polling payload");
                continue;
            }
        };
        if !forward(packets, &inbound) {
            return;
        }
    }
}

/// Queue `packets` for the driver in order. Returns `false` once the driver
/// has stopped listening.
fn forward(packets: Vec<EnginePacket>, inbound: &mpsc::UnboundedSender<EnginePacket>) -> bool {
    packets
        .into_iter()
        .all(|packet| inbound.send(packet).is_ok())
}

/// Route inbound packets and owner commands until the owner closes, the
/// server leaves, or the liveness window passes without traffic. Listeners
/// are cleared on exit so subscribers observe the loss.
async fn drive(
    poster: Poster,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut packets: mpsc::UnboundedReceiver<EnginePacket>,
    listeners: EventListeners,
    liveness: Duration,
) {
    let mut deadline = Instant::now() + liveness;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(packet)) => {
                    if let Err(error) = poster.post(&[packet]).await {
                        warn!(error = %error, "polling send failed");
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(error) = poster.post(&[disconnect_packet(), EnginePacket::Close]).await {
                        debug!(error = %error, "polling close not delivered");
                    }
                    break;
                }
            },
            packet = packets.recv() => {
                let Some(packet) = packet else {
                    debug!("polling stream ended");
                    break;
                };
                deadline = Instant::now() + liveness;
                match react(packet, &listeners) {
                    Reaction::Continue => {}
                    Reaction::Reply(reply) => {
                        if let Err(error) = poster.post(&[reply]).await {
                            warn!(error = %error, "polling pong failed");
                            break;
                        }
                    }
                    Reaction::Disconnected => break,
                }
            }
            () = sleep_until(deadline) => {
                warn!("polling session silent past the ping window");
                break;
            }
        }
    }
    listeners.clear();
}
