//! HTTP outbound adapters.
//!
//! Thin reqwest implementation of the `SessionApi` port. Every request goes
//! through one client whose cookie jar is shared with the realtime connector,
//! so the session cookie set at login also authenticates the socket.

mod dto;
mod session_api;

pub use session_api::HttpSessionApi;
