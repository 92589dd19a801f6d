//! Server-pushed notification events.

use serde::Deserialize;
use serde_json::Value;

/// Inbound event emitted when the current user is hired for a gig.
pub const HIRED_EVENT: &str = "notification:hired";
/// Outbound event associating a connection with a user's room.
pub const JOIN_EVENT: &str = "join";
/// Alert text used when a hire event carries no message.
pub const HIRED_FALLBACK_MESSAGE: &str = "You have been hired!";

/// Payload of a [`HIRED_EVENT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NotificationEvent {
    /// Message text supplied by the server.
    #[serde(default)]
    pub message: Option<String>,
}

impl NotificationEvent {
    /// Decode a raw payload. Anything without a usable `message` string yields
    /// an event with no message rather than an error.
    ///
    /// # Examples
    /// ```
    /// use gigflow_client::domain::NotificationEvent;
    /// use serde_json::json;
    ///
    /// let event = NotificationEvent::from_payload(&json!({"message": "Hired for Logo"}));
    /// assert_eq!(event.alert_text(), "Hired for Logo");
    /// assert_eq!(NotificationEvent::from_payload(&json!(42)).alert_text(), "You have been hired!");
    /// ```
    pub fn from_payload(payload: &Value) -> Self {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_owned);
        Self { message }
    }

    /// Text to show in the alert.
    pub fn alert_text(&self) -> &str {
        self.message.as_deref().unwrap_or(HIRED_FALLBACK_MESSAGE)
    }
}
