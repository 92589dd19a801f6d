//! Client configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `GIGFLOW_*` environment variables and config
//! files. Every field is optional; accessors supply the defaults. The login
//! password is not a field: it is read from the environment only, see
//! [`login_password`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::ports::{TransportProtocol, UnknownTransportProtocol};
use crate::domain::{AlertPolicy, DEFAULT_AUTO_DISMISS, DEFAULT_MAX_VISIBLE, ReconnectPolicy};

/// Environment variable holding the password for the unattended sign-in.
pub const LOGIN_PASSWORD_ENV: &str = "GIGFLOW_LOGIN_PASSWORD";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TRANSPORTS: [TransportProtocol; 2] =
    [TransportProtocol::WebSocket, TransportProtocol::Polling];
const DEFAULT_AUDIO_PLAYER: &str = "paplay";

/// Configuration values for the session core and notifier.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GIGFLOW")]
pub struct ClientSettings {
    /// REST API base URL, e.g. `http://localhost:5000/api`.
    pub api_base_url: Option<String>,
    /// Per-request timeout for REST calls and realtime handshakes.
    pub request_timeout_ms: Option<u64>,
    /// Comma-separated realtime transports in negotiation order.
    pub transports: Option<String>,
    /// Reconnect attempts after a realtime failure.
    pub reconnect_attempts: Option<u32>,
    /// Delay before the first reconnect attempt.
    pub reconnect_delay_ms: Option<u64>,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay_ms: Option<u64>,
    /// Lifetime of each alert.
    pub alert_auto_dismiss_ms: Option<u64>,
    /// Maximum alerts visible at once.
    pub alert_max_visible: Option<usize>,
    /// Sound played with hire alerts; unset keeps the notifier silent.
    pub audio_cue_path: Option<PathBuf>,
    /// Program used to play the sound.
    pub audio_player: Option<String>,
    /// Account email for the unattended sign-in.
    pub login_email: Option<String>,
}

impl ClientSettings {
    /// Return the REST base URL, falling back to the local default.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the configured value is not a URL.
    pub fn api_base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(
            self.api_base_url
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )
    }

    /// Return the request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_ms
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis)
    }

    /// Return the realtime transports in negotiation order.
    ///
    /// Blank entries are skipped; a blank list means the default order.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTransportProtocol`] for an unrecognised name.
    pub fn transports(&self) -> Result<Vec<TransportProtocol>, UnknownTransportProtocol> {
        let Some(raw) = self.transports.as_deref() else {
            return Ok(DEFAULT_TRANSPORTS.to_vec());
        };
        let mut protocols = Vec::new();
        for name in raw.split(',').filter(|name| !name.trim().is_empty()) {
            let protocol = name.parse::<TransportProtocol>()?;
            if !protocols.contains(&protocol) {
                protocols.push(protocol);
            }
        }
        if protocols.is_empty() {
            return Ok(DEFAULT_TRANSPORTS.to_vec());
        }
        Ok(protocols)
    }

    /// Return the reconnect policy with unset values taken from the default.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let defaults = ReconnectPolicy::default();
        ReconnectPolicy {
            max_attempts: self.reconnect_attempts.unwrap_or(defaults.max_attempts),
            initial_delay: self
                .reconnect_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: self
                .reconnect_max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        }
    }

    /// Return the alert display limits.
    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            auto_dismiss: self
                .alert_auto_dismiss_ms
                .map_or(DEFAULT_AUTO_DISMISS, Duration::from_millis),
            max_visible: self.alert_max_visible.unwrap_or(DEFAULT_MAX_VISIBLE),
        }
    }

    /// Return the sound file path, if one is configured.
    pub fn audio_cue_path(&self) -> Option<&Path> {
        self.audio_cue_path.as_deref()
    }

    /// Return the audio player program.
    pub fn audio_player(&self) -> &str {
        self.audio_player.as_deref().unwrap_or(DEFAULT_AUDIO_PLAYER)
    }

    /// Return the sign-in email, ignoring blank values.
    pub fn login_email(&self) -> Option<&str> {
        self.login_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// Read the sign-in password from [`LOGIN_PASSWORD_ENV`].
pub fn login_password() -> Option<Zeroizing<String>> {
    std::env::var(LOGIN_PASSWORD_ENV)
        .ok()
        .filter(|password| !password.is_empty())
        .map(Zeroizing::new)
}

#[cfg(test)]
mod tests {
    //! Unit tests for client configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const KEYS: [&str; 11] = [
        "GIGFLOW_API_BASE_URL",
        "GIGFLOW_REQUEST_TIMEOUT_MS",
        "GIGFLOW_TRANSPORTS",
        "GIGFLOW_RECONNECT_ATTEMPTS",
        "GIGFLOW_RECONNECT_DELAY_MS",
        "GIGFLOW_RECONNECT_MAX_DELAY_MS",
        "GIGFLOW_ALERT_AUTO_DISMISS_MS",
        "GIGFLOW_ALERT_MAX_VISIBLE",
        "GIGFLOW_AUDIO_CUE_PATH",
        "GIGFLOW_AUDIO_PLAYER",
        "GIGFLOW_LOGIN_EMAIL",
    ];

    fn load_from_empty_args() -> ClientSettings {
        ClientSettings::load_from_iter([OsString::from("gigflow-notify")])
            .expect("config should load")
    }

    fn settings_with_transports(raw: Option<&str>) -> ClientSettings {
        ClientSettings {
            api_base_url: None,
            request_timeout_ms: None,
            transports: raw.map(str::to_owned),
            reconnect_attempts: None,
            reconnect_delay_ms: None,
            reconnect_max_delay_ms: None,
            alert_auto_dismiss_ms: None,
            alert_max_visible: None,
            audio_cue_path: None,
            audio_player: None,
            login_email: None,
        }
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(KEYS.map(|key| (key, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.api_base_url().expect("default url").as_str(),
            "http://localhost:5000/api"
        );
        assert_eq!(settings.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(
            settings.transports().expect("default transports"),
            DEFAULT_TRANSPORTS.to_vec()
        );
        assert_eq!(settings.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(settings.alert_policy(), AlertPolicy::default());
        assert!(settings.audio_cue_path().is_none());
        assert_eq!(settings.audio_player(), DEFAULT_AUDIO_PLAYER);
        assert!(settings.login_email().is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let mut overrides = KEYS.map(|key| (key, None::<String>));
        let values = [
            "https://gigflow.example/api",
            "2500",
            "polling",
            "2",
            "100",
            "800",
            "1500",
            "1",
            "/tmp/ding.wav",
            "afplay",
            "ada@example.com",
        ];
        for (entry, value) in overrides.iter_mut().zip(values) {
            entry.1 = Some(value.to_owned());
        }
        let _guard = lock_env(overrides);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.api_base_url().expect("url").as_str(),
            "https://gigflow.example/api"
        );
        assert_eq!(settings.request_timeout(), Duration::from_millis(2500));
        assert_eq!(
            settings.transports().expect("transports"),
            vec![TransportProtocol::Polling]
        );
        assert_eq!(
            settings.reconnect_policy(),
            ReconnectPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_millis(800),
            }
        );
        assert_eq!(
            settings.alert_policy(),
            AlertPolicy {
                auto_dismiss: Duration::from_millis(1500),
                max_visible: 1,
            }
        );
        assert_eq!(settings.audio_cue_path(), Some(Path::new("/tmp/ding.wav")));
        assert_eq!(settings.audio_player(), "afplay");
        assert_eq!(settings.login_email(), Some("ada@example.com"));
    }

    #[rstest]
    #[case(Some("websocket, polling"), vec![TransportProtocol::WebSocket, TransportProtocol::Polling])]
    #[case(Some("polling,websocket"), vec![TransportProtocol::Polling, TransportProtocol::WebSocket])]
    #[case(Some("polling,polling"), vec![TransportProtocol::Polling])]
    #[case(Some(" , "), DEFAULT_TRANSPORTS.to_vec())]
    #[case(None, DEFAULT_TRANSPORTS.to_vec())]
    fn transports_keep_their_configured_order(
        #[case] raw: Option<&str>,
        #[case] expected: Vec<TransportProtocol>,
    ) {
        let settings = settings_with_transports(raw);
        assert_eq!(settings.transports().expect("transports"), expected);
    }

    #[rstest]
    fn unknown_transport_names_are_rejected() {
        let settings = settings_with_transports(Some("websocket,smoke-signal"));
        let error = settings.transports().expect_err("unknown transport");
        assert_eq!(error, UnknownTransportProtocol("smoke-signal".to_owned()));
    }

    #[rstest]
    fn password_comes_from_the_environment_only() {
        let _guard = lock_env([(LOGIN_PASSWORD_ENV, Some("hunter2".to_owned()))]);
        assert_eq!(login_password().as_deref().map(String::as_str), Some("hunter2"));
    }

    #[rstest]
    fn empty_password_is_ignored() {
        let _guard = lock_env([(LOGIN_PASSWORD_ENV, Some(String::new()))]);
        assert!(login_password().is_none());
    }
}
