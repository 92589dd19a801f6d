//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **http**: reqwest-backed session API with a shared cookie jar
//! - **realtime**: Socket.IO client over WebSocket and HTTP long-polling
//! - **alerts**: tracing-backed alert sink for terminal use
//! - **audio**: external-player audio cue
//!
//! Adapters are thin translators between domain types and wire formats. They
//! contain no session logic.

pub mod alerts;
pub mod audio;
pub mod http;
pub mod realtime;
