//! Composition root wiring settings into the session store and notifier.
//!
//! Both adapters share one cookie jar, so the realtime handshake carries the
//! session cookie that the REST calls established.

use std::sync::Arc;

use mockable::DefaultClock;
use reqwest::cookie::Jar;
use tracing::debug;

use crate::config::ClientSettings;
use crate::domain::ports::{AudioCue, SilentAudioCue, UnknownTransportProtocol};
use crate::domain::{NotificationChannel, NotificationChannelConfig, SessionStore};
use crate::outbound::alerts::TracingAlertSink;
use crate::outbound::audio::CommandAudioCue;
use crate::outbound::http::HttpSessionApi;
use crate::outbound::realtime::{SocketIoConnector, realtime_origin};

/// Errors raised while assembling the client from settings.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The REST base URL could not be parsed.
    #[error("invalid api base url: {0}")]
    ApiBaseUrl(#[from] url::ParseError),
    /// A configured realtime transport is unknown.
    #[error(transparent)]
    Transport(#[from] UnknownTransportProtocol),
    /// An HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Assembled client: the session store and a notifier ready to spawn.
pub struct ClientParts {
    /// Session store shared by every caller.
    pub store: Arc<SessionStore>,
    /// Notification channel; spawn it with [`SessionStore::subscribe`].
    pub channel: NotificationChannel,
}

/// Build the client from `settings`.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when a setting is invalid or an HTTP client
/// cannot be built.
pub fn build(settings: &ClientSettings) -> Result<ClientParts, ClientBuildError> {
    let api_base = settings.api_base_url()?;
    let transports = settings.transports()?;
    let timeout = settings.request_timeout();
    let jar = Arc::new(Jar::default());

    let api = HttpSessionApi::new(api_base.clone(), timeout, Arc::clone(&jar))?;
    let store = Arc::new(SessionStore::new(Arc::new(api)));

    let origin = realtime_origin(&api_base);
    debug!(api = %api_base, realtime = %origin, "client endpoints resolved");
    let connector = SocketIoConnector::new(origin, transports, jar, timeout)?;

    let audio: Arc<dyn AudioCue> = match settings.audio_cue_path() {
        Some(path) => Arc::new(CommandAudioCue::new(settings.audio_player(), path)),
        None => Arc::new(SilentAudioCue),
    };
    let channel = NotificationChannel::new(
        Arc::new(connector),
        Arc::new(TracingAlertSink),
        audio,
        Arc::new(DefaultClock),
    )
    .with_config(NotificationChannelConfig {
        reconnect: settings.reconnect_policy(),
        alerts: settings.alert_policy(),
    });

    Ok(ClientParts { store, channel })
}
