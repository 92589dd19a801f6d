//! Protocol steps shared by the WebSocket and polling transports.

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, trace};

use super::codec::{CodecError, EnginePacket, OpenHandshake, SocketPacket};
use crate::domain::ports::{EventListeners, TransportError, TransportProtocol};

/// Engine.IO protocol revision sent in the `EIO` query parameter.
pub(super) const ENGINE_IO_VERSION: &str = "4";
/// Path served by the realtime endpoint.
pub(super) const SOCKET_IO_PATH: &str = "/socket.io/";

/// Instruction from a transport's owner to its IO task.
#[derive(Debug)]
pub(super) enum Command {
    Send(EnginePacket),
    Close,
}

/// What the IO task must do after handling one inbound packet.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Reaction {
    Continue,
    Reply(EnginePacket),
    Disconnected,
}

impl From<CodecError> for TransportError {
    fn from(error: CodecError) -> Self {
        Self::protocol(error.to_string())
    }
}

/// Build the Engine.IO endpoint for `protocol`, with the session id once
/// known. WebSocket endpoints use the `ws`/`wss` schemes.
pub(super) fn endpoint(
    origin: &Url,
    protocol: TransportProtocol,
    sid: Option<&str>,
) -> Result<Url, TransportError> {
    let mut url = origin.join(SOCKET_IO_PATH).map_err(|error| {
        TransportError::connect(format!("invalid realtime origin '{origin}': {error}"))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.append_pair("EIO", ENGINE_IO_VERSION);
        query.append_pair("transport", protocol.as_str());
        if let Some(sid) = sid {
            query.append_pair("sid", sid);
        }
    }
    if protocol == TransportProtocol::WebSocket {
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| {
            TransportError::connect(format!("cannot use scheme '{scheme}' for {origin}"))
        })?;
    }
    Ok(url)
}

/// Require the Engine.IO open packet.
pub(super) fn expect_open(packet: EnginePacket) -> Result<OpenHandshake, TransportError> {
    match packet {
        EnginePacket::Open(handshake) => Ok(handshake),
        other => Err(TransportError::protocol(format!(
            "expected open packet, got {other:?}"
        ))),
    }
}

/// Interpret a packet received while waiting for the namespace connect.
///
/// Returns `None` while the outcome is still unknown.
pub(super) fn connect_outcome(packet: &EnginePacket) -> Option<Result<(), TransportError>> {
    let EnginePacket::Message(text) = packet else {
        return match packet {
            EnginePacket::Close => Some(Err(TransportError::closed())),
            _ => None,
        };
    };
    match SocketPacket::decode(text) {
        Ok(SocketPacket::Connect { sid }) => {
            debug!(socket_id = sid.as_deref().unwrap_or("-"), "realtime namespace connected");
            Some(Ok(()))
        }
        Ok(SocketPacket::ConnectError { message }) => Some(Err(TransportError::refused(message))),
        Ok(_) => None,
        Err(error) => Some(Err(TransportError::protocol(error.to_string()))),
    }
}

/// Handle one inbound packet on an established connection.
pub(super) fn react(packet: EnginePacket, listeners: &EventListeners) -> Reaction {
    match packet {
        EnginePacket::Ping(data) => Reaction::Reply(EnginePacket::Pong(data)),
        EnginePacket::Close => Reaction::Disconnected,
        EnginePacket::Message(text) => match SocketPacket::decode(&text) {
            Ok(SocketPacket::Event { name, payload, .. }) => {
                if !listeners.dispatch(&name, payload) {
                    trace!(event = %name, "realtime event without listener");
                }
                Reaction::Continue
            }
            Ok(SocketPacket::Disconnect) => Reaction::Disconnected,
            Ok(other) => {
                trace!(packet = ?other, "ignoring realtime packet");
                Reaction::Continue
            }
            Err(error) => {
                debug!(error = %error, "undecodable realtime packet");
                Reaction::Continue
            }
        },
        EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
            Reaction::Continue
        }
    }
}

/// Engine packet carrying a Socket.IO event.
pub(super) fn event_packet(event: &str, payload: Value) -> EnginePacket {
    SocketPacket::event(event, payload).into_engine()
}

/// Engine packet requesting the default namespace.
pub(super) fn connect_packet() -> EnginePacket {
    SocketPacket::Connect { sid: None }.into_engine()
}

/// Engine packet leaving the default namespace.
pub(super) fn disconnect_packet() -> EnginePacket {
    SocketPacket::Disconnect.into_engine()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(
        "http://localhost:5000",
        TransportProtocol::WebSocket,
        None,
        "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
    )]
    #[case(
        "https://gigflow.example",
        TransportProtocol::WebSocket,
        None,
        "wss://gigflow.example/socket.io/?EIO=4&transport=websocket"
    )]
    #[case(
        "http://localhost:5000",
        TransportProtocol::Polling,
        Some("abc"),
        "http://localhost:5000/socket.io/?EIO=4&transport=polling&sid=abc"
    )]
    fn builds_engine_endpoints(
        #[case] origin: &str,
        #[case] protocol: TransportProtocol,
        #[case] sid: Option<&str>,
        #[case] expected: &str,
    ) {
        let origin = Url::parse(origin).expect("origin");
        let url = endpoint(&origin, protocol, sid).expect("endpoint");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case(EnginePacket::Message("0{\"sid\":\"s1\"}".to_owned()), Some(Ok(())))]
    #[case(
        EnginePacket::Message("4{\"message\":\"Not authorized\"}".to_owned()),
        Some(Err(TransportError::refused("Not authorized")))
    )]
    #[case(EnginePacket::Ping(String::new()), None)]
    #[case(EnginePacket::Close, Some(Err(TransportError::closed())))]
    fn recognises_namespace_connect_outcomes(
        #[case] packet: EnginePacket,
        #[case] expected: Option<Result<(), TransportError>>,
    ) {
        assert_eq!(connect_outcome(&packet), expected);
    }

    #[tokio::test]
    async fn routes_events_to_their_listener() {
        let listeners = EventListeners::default();
        let mut hired = listeners.register("notification:hired").expect("listener");
        let packet = event_packet("notification:hired", json!({"message": "hi"}));

        assert_eq!(react(packet, &listeners), Reaction::Continue);
        assert_eq!(hired.recv().await, Some(json!({"message": "hi"})));
    }

    #[rstest]
    #[case(EnginePacket::Ping(String::new()), Reaction::Reply(EnginePacket::Pong(String::new())))]
    #[case(EnginePacket::Close, Reaction::Disconnected)]
    #[case(EnginePacket::Message("1".to_owned()), Reaction::Disconnected)]
    #[case(EnginePacket::Noop, Reaction::Continue)]
    #[case(EnginePacket::Message("2[42]".to_owned()), Reaction::Continue)]
    fn reacts_to_control_packets(#[case] packet: EnginePacket, #[case] expected: Reaction) {
        assert_eq!(react(packet, &EventListeners::default()), expected);
    }
}
