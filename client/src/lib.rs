//! Session and notification core for the GigFlow marketplace client.
//!
//! [`domain::SessionStore`] owns the signed-in identity and the session
//! commands; [`domain::NotificationChannel`] keeps a realtime connection
//! joined to that identity and raises an alert for every hire event.
//! [`outbound`] holds the HTTP, Socket.IO, alert and audio adapters, and
//! [`app`] wires them together from [`config::ClientSettings`].

pub mod app;
pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
