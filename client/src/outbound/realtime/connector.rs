//! Realtime connector that negotiates the first workable sub-protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use tracing::debug;

use super::polling::PollingTransport;
use super::websocket::WebSocketTransport;
use crate::domain::ports::{
    RealtimeConnector, RealtimeTransport, TransportError, TransportProtocol,
};

/// Path segment of the REST API that the realtime endpoint does not share.
const API_SEGMENT: &str = "api";

/// Socket.IO connector trying each configured protocol in order.
///
/// Every connection carries the cookies held in the shared jar, so the
/// server sees the same session the REST adapter established.
pub struct SocketIoConnector {
    origin: Url,
    protocols: Vec<TransportProtocol>,
    jar: Arc<Jar>,
    client: Client,
    handshake_timeout: Duration,
}

impl SocketIoConnector {
    /// Build a connector for the server at `origin`.
    ///
    /// An empty protocol list falls back to WebSocket then polling.
    ///
    /// # Errors
    ///
    /// Returns an error when the polling HTTP client cannot be constructed.
    pub fn new(
        origin: Url,
        protocols: Vec<TransportProtocol>,
        jar: Arc<Jar>,
        handshake_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().cookie_provider(Arc::clone(&jar)).build()?;
        let protocols = if protocols.is_empty() {
            vec![TransportProtocol::WebSocket, TransportProtocol::Polling]
        } else {
            protocols
        };
        Ok(Self {
            origin,
            protocols,
            jar,
            client,
            handshake_timeout,
        })
    }

    /// Protocols in negotiation order.
    pub fn protocols(&self) -> &[TransportProtocol] {
        &self.protocols
    }

    async fn open(
        &self,
        protocol: TransportProtocol,
    ) -> Result<Box<dyn RealtimeTransport>, TransportError> {
        match protocol {
            TransportProtocol::WebSocket => {
                WebSocketTransport::open(&self.origin, &self.jar, self.handshake_timeout)
                    .await
                    .map(|transport| Box::new(transport) as Box<dyn RealtimeTransport>)
            }
            TransportProtocol::Polling => {
                PollingTransport::open(&self.origin, &self.client, self.handshake_timeout)
                    .await
                    .map(|transport| Box::new(transport) as Box<dyn RealtimeTransport>)
            }
        }
    }
}

#[async_trait]
impl RealtimeConnector for SocketIoConnector {
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, TransportError> {
        let mut last_error = TransportError::connect("no realtime transport configured");
        for protocol in &self.protocols {
            match self.open(*protocol).await {
                Ok(transport) => {
                    debug!(protocol = %protocol, "realtime transport negotiated");
                    return Ok(transport);
                }
                Err(error) => {
                    debug!(protocol = %protocol, error = %error, "realtime transport unavailable");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }
}

/// Derive the realtime server origin from the REST base URL by dropping a
/// trailing `api` path segment.
///
/// ```
/// use gigflow_client::outbound::realtime::realtime_origin;
/// use reqwest::Url;
///
/// let api = Url::parse("http://localhost:5000/api").expect("url");
/// assert_eq!(realtime_origin(&api).as_str(), "http://localhost:5000/");
/// ```
#[must_use]
pub fn realtime_origin(api_base: &Url) -> Url {
    let mut origin = api_base.clone();
    origin.set_query(None);
    origin.set_fragment(None);
    let mut segments: Vec<&str> = api_base
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();
    if segments.last() == Some(&API_SEGMENT) {
        segments.pop();
    }
    let path = if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", segments.join("/"))
    };
    origin.set_path(&path);
    origin
}
