//! Engine.IO v4 and Socket.IO v5 text framing.
//!
//! Only the default namespace and text packets are supported; binary
//! attachments are rejected.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Separator between packets in a polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Framing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty packet")]
    Empty,
    #[error("unknown engine packet type '{0}'")]
    UnknownEngineType(char),
    #[error("unknown socket packet type '{0}'")]
    UnknownSocketType(char),
    #[error("invalid open handshake: {0}")]
    Handshake(String),
    #[error("invalid packet data: {0}")]
    Data(String),
    #[error("binary packets are not supported")]
    Binary,
    #[error("unsupported namespace '{0}'")]
    Namespace(String),
}

/// Handshake carried by the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Longest silence tolerated before the connection counts as lost.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode one text packet.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let data = chars.as_str();
        match kind {
            '0' => serde_json::from_str(data)
                .map(Self::Open)
                .map_err(|error| CodecError::Handshake(error.to_string())),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data.to_owned())),
            '3' => Ok(Self::Pong(data.to_owned())),
            '4' => Ok(Self::Message(data.to_owned())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            'b' => Err(CodecError::Binary),
            other => Err(CodecError::UnknownEngineType(other)),
        }
    }

    /// Encode as a text packet. Open packets are server-only and encode as
    /// their type digit alone.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_owned(),
            Self::Close => "1".to_owned(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_owned(),
            Self::Noop => "6".to_owned(),
        }
    }
}

/// Split a polling response body into packets.
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>, CodecError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split(RECORD_SEPARATOR).map(EnginePacket::decode).collect()
}

/// Join packets into one polling request body.
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// Socket.IO packet in the default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketPacket {
    /// Client connect request, or the server's acknowledgement with its sid.
    Connect { sid: Option<String> },
    Disconnect,
    /// Named event; only the first argument is kept as the payload.
    Event {
        name: String,
        payload: Value,
        ack: Option<u64>,
    },
    Ack { id: u64, data: Vec<Value> },
    ConnectError { message: String },
}

impl SocketPacket {
    /// Event packet with a single argument.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
            ack: None,
        }
    }

    /// Decode the data of an Engine.IO message packet.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let rest = chars.as_str();
        if matches!(kind, '5' | '6') {
            return Err(CodecError::Binary);
        }
        let rest = strip_namespace(rest)?;
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (ack_digits, data) = rest.split_at(digits);
        let ack = if ack_digits.is_empty() {
            None
        } else {
            Some(
                ack_digits
                    .parse::<u64>()
                    .map_err(|error| CodecError::Data(error.to_string()))?,
            )
        };
        let data = if data.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(data)
                    .map_err(|error| CodecError::Data(error.to_string()))?,
            )
        };

        match kind {
            '0' => Ok(Self::Connect {
                sid: data
                    .as_ref()
                    .and_then(|value| value.get("sid"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            }),
            '1' => Ok(Self::Disconnect),
            '2' => decode_event(data, ack),
            '3' => Ok(Self::Ack {
                id: ack.ok_or_else(|| CodecError::Data("ack without id".to_owned()))?,
                data: match data {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                },
            }),
            '4' => Ok(Self::ConnectError {
                message: data
                    .as_ref()
                    .and_then(|value| value.get("message").and_then(Value::as_str).or(value.as_str()))
                    .unwrap_or("connection refused")
                    .to_owned(),
            }),
            other => Err(CodecError::UnknownSocketType(other)),
        }
    }

    /// Encode as the data of an Engine.IO message packet.
    pub fn encode(&self) -> String {
        match self {
            Self::Connect { .. } => "0".to_owned(),
            Self::Disconnect => "1".to_owned(),
            Self::Event { name, payload, ack } => {
                let args = Value::Array(vec![Value::String(name.clone()), payload.clone()]);
                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("2{ack}{args}")
            }
            Self::Ack { id, data } => format!("3{id}{}", Value::Array(data.clone())),
            Self::ConnectError { message } => {
                format!("4{}", serde_json::json!({ "message": message }))
            }
        }
    }

    /// Wrap as an Engine.IO message packet.
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }
}

fn strip_namespace(rest: &str) -> Result<&str, CodecError> {
    if !rest.starts_with('/') {
        return Ok(rest);
    }
    let (namespace, remainder) = rest.split_once(',').unwrap_or((rest, ""));
    if namespace == "/" {
        Ok(remainder)
    } else {
        Err(CodecError::Namespace(namespace.to_owned()))
    }
}

fn decode_event(data: Option<Value>, ack: Option<u64>) -> Result<SocketPacket, CodecError> {
    let Some(Value::Array(mut args)) = data else {
        return Err(CodecError::Data("event data must be an array".to_owned()));
    };
    if args.is_empty() {
        return Err(CodecError::Data("event without a name".to_owned()));
    }
    let Value::String(name) = args.remove(0) else {
        return Err(CodecError::Data("event name must be a string".to_owned()));
    };
    let payload = if args.is_empty() {
        Value::Null
    } else {
        args.swap_remove(0)
    };
    Ok(SocketPacket::Event { name, payload, ack })
}
