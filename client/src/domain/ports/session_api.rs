//! Driven port for the backend session endpoints.
//!
//! The session store talks to the REST API only through this trait so store
//! tests can substitute deterministic doubles for the HTTP adapter.

use async_trait::async_trait;

use crate::domain::{Identity, LoginCredentials, RegistrationProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by session API adapters.
    pub enum SessionApiError {
        /// Server answered non-2xx with a structured `{message}` body.
        Rejected { status: u16, message: String } =>
            "session request rejected with status {status}: {message}",
        /// Server answered non-2xx without a usable message.
        Status { status: u16 } => "session request rejected with status {status}",
        /// The request never produced a response.
        Transport { message: String } => "session request failed: {message}",
        /// The request timed out.
        Timeout { message: String } => "session request timed out: {message}",
        /// The response body could not be decoded into an identity.
        Decode { message: String } => "session response could not be decoded: {message}",
    }
}

impl SessionApiError {
    /// Server-supplied message, if the server sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    /// HTTP status when the server responded at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Port exposing the four session endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /auth/me`: probe whether the session cookie is still valid.
    async fn current_identity(&self) -> Result<Identity, SessionApiError>;

    /// `POST /auth/login`.
    async fn login(&self, credentials: &LoginCredentials) -> Result<Identity, SessionApiError>;

    /// `POST /auth/register`.
    async fn register(&self, profile: &RegistrationProfile) -> Result<Identity, SessionApiError>;

    /// `POST /auth/logout`.
    async fn logout(&self) -> Result<(), SessionApiError>;
}
