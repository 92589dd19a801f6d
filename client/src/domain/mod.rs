//! Domain primitives and services.
//!
//! Purpose: model the signed-in user and the session lifecycle, and keep the
//! realtime notification channel bound to that user. Adapters reach the
//! outside world only through the traits in [`ports`].
//!
//! Public surface:
//! - Identity (alias to `identity::Identity`) and its validated id and name.
//! - LoginCredentials / RegistrationProfile: validated form input.
//! - SessionStore: reactive session state plus the session commands.
//! - NotificationChannel: background supervisor turning hire events into
//!   alerts.

pub mod alerts;
pub mod auth;
pub mod error;
pub mod identity;
pub mod notification;
pub mod notification_channel;
pub mod ports;
pub mod reconnect;
pub mod session_state;
pub mod session_store;

pub use self::alerts::{
    Admission, Alert, AlertBoard, AlertId, AlertLevel, AlertPolicy, DEFAULT_AUTO_DISMISS,
    DEFAULT_MAX_VISIBLE,
};
pub use self::auth::{CredentialsValidationError, LoginCredentials, RegistrationProfile};
pub use self::error::{
    LOGIN_FAILED, LOGOUT_FAILED, REGISTRATION_FAILED, SESSION_CHECK_FAILED, SESSION_SUPERSEDED,
    SessionError,
};
pub use self::identity::{DisplayName, Identity, IdentityValidationError, UserId};
pub use self::notification::{
    HIRED_EVENT, HIRED_FALLBACK_MESSAGE, JOIN_EVENT, NotificationEvent,
};
pub use self::notification_channel::{
    ChannelBinding, ChannelHandle, NotificationChannel, NotificationChannelConfig,
};
pub use self::reconnect::{
    RandomJitter, ReconnectJitter, ReconnectPolicy, ReconnectRuntime, ReconnectSleeper,
    TokioSleeper,
};
pub use self::session_state::{RouteAccess, SessionState};
pub use self::session_store::SessionStore;
