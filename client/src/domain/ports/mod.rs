//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod alert_sink;
mod audio_cue;
mod realtime;
mod session_api;

#[cfg(test)]
pub use alert_sink::MockAlertSink;
pub use alert_sink::AlertSink;
#[cfg(test)]
pub use audio_cue::MockAudioCue;
pub use audio_cue::{AudioCue, AudioCueError, SilentAudioCue};
pub use realtime::{
    EventListeners, EventSubscription, RealtimeConnector, RealtimeTransport, TransportError,
    TransportProtocol, UnknownTransportProtocol,
};
#[cfg(test)]
pub use session_api::MockSessionApi;
pub use session_api::{SessionApi, SessionApiError};
