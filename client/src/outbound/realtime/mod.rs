//! Socket.IO adapter for the realtime port.
//!
//! Speaks Engine.IO v4 framing with Socket.IO v5 packets on the default
//! namespace. WebSocket is preferred; HTTP long-polling is the fallback.

pub mod codec;
mod connector;
mod polling;
mod protocol;
mod websocket;

pub use connector::{SocketIoConnector, realtime_origin};
pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;
