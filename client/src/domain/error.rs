//! Errors returned by session operations to the calling UI.
//!
//! Callers only need two things from a failure: the text to show next to the
//! form, and whether the server actually looked at the request. Transport
//! detail is kept for logs but never shown.

use super::ports::SessionApiError;

/// Fallback shown when a login fails without a server message.
pub const LOGIN_FAILED: &str = "Login failed";
/// Fallback shown when a registration fails without a server message.
pub const REGISTRATION_FAILED: &str = "Registration failed";
/// Fallback reported when the logout call fails.
pub const LOGOUT_FAILED: &str = "Logout failed";
/// Fallback used when the session probe fails.
pub const SESSION_CHECK_FAILED: &str = "Session check failed";
/// Reported when a sign-in finished after a later sign-out had settled.
pub const SESSION_SUPERSEDED: &str = "Signed out before the request finished";

/// Failed outcome of a session operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The server rejected the request and explained why.
    #[error("{message}")]
    Rejected {
        /// HTTP status returned by the server.
        status: u16,
        /// Server-supplied message, surfaced verbatim.
        message: String,
    },
    /// The request failed without a server explanation.
    #[error("{message}")]
    Unavailable {
        /// Fixed fallback text for the operation.
        message: String,
        /// Adapter detail kept for diagnostics.
        detail: String,
    },
    /// The server accepted the request, but a sign-out started afterwards
    /// had already settled, so the outcome was discarded.
    #[error("{}", SESSION_SUPERSEDED)]
    Superseded,
}

impl SessionError {
    /// Map a port error, using `fallback` when the server gave no message.
    ///
    /// # Examples
    /// ```
    /// use gigflow_client::domain::ports::SessionApiError;
    /// use gigflow_client::domain::{SessionError, LOGIN_FAILED};
    ///
    /// let err = SessionError::from_api(SessionApiError::status(500_u16), LOGIN_FAILED);
    /// assert_eq!(err.message(), "Login failed");
    /// ```
    pub fn from_api(error: SessionApiError, fallback: &str) -> Self {
        match error {
            SessionApiError::Rejected { status, message } if !message.trim().is_empty() => {
                Self::Rejected { status, message }
            }
            other => Self::Unavailable {
                message: fallback.to_owned(),
                detail: other.to_string(),
            },
        }
    }

    /// Text to show the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } | Self::Unavailable { message, .. } => {
                message.as_str()
            }
            Self::Superseded => SESSION_SUPERSEDED,
        }
    }

    /// Whether the server processed and refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
