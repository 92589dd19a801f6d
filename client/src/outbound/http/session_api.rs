//! Reqwest-backed session API adapter.
//!
//! Owns transport details only: endpoint joining, JSON bodies, timeout and
//! status mapping, and decoding identities. Cookies travel through the shared
//! jar so the server-side session survives between calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, RequestBuilder, StatusCode, Url};

use super::dto::{ErrorBodyDto, IdentityDto, LoginRequest, RegisterRequest};
use crate::domain::ports::{SessionApi, SessionApiError};
use crate::domain::{Identity, LoginCredentials, RegistrationProfile};

const CURRENT_IDENTITY_PATH: &str = "auth/me";
const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const LOGOUT_PATH: &str = "auth/logout";

/// Session API adapter talking to the marketplace REST API.
pub struct HttpSessionApi {
    client: Client,
    base: Url,
}

impl HttpSessionApi {
    /// Build an adapter rooted at `base` (e.g. `http://localhost:5000/api`).
    /// ```rust,ignore
    /// let jar = Arc::new(Jar::default());
    /// let api = HttpSessionApi::new(base, Duration::from_secs(10), jar)?;
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration, jar: Arc<Jar>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(jar)
            .build()?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionApiError> {
        self.base.join(path).map_err(|error| {
            SessionApiError::transport(format!("invalid endpoint '{path}': {error}"))
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, SessionApiError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn fetch_identity(&self, request: RequestBuilder) -> Result<Identity, SessionApiError> {
        let body = self.send(request).await?;
        parse_identity(&body)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn current_identity(&self) -> Result<Identity, SessionApiError> {
        let url = self.endpoint(CURRENT_IDENTITY_PATH)?;
        self.fetch_identity(self.client.get(url)).await
    }

    async fn login(&self, credentials: &LoginCredentials) -> Result<Identity, SessionApiError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let body = LoginRequest::from(credentials);
        self.fetch_identity(self.client.post(url).json(&body)).await
    }

    async fn register(&self, profile: &RegistrationProfile) -> Result<Identity, SessionApiError> {
        let url = self.endpoint(REGISTER_PATH)?;
        let body = RegisterRequest::from(profile);
        self.fetch_identity(self.client.post(url).json(&body)).await
    }

    async fn logout(&self) -> Result<(), SessionApiError> {
        let url = self.endpoint(LOGOUT_PATH)?;
        self.send(self.client.post(url)).await.map(|_| ())
    }
}

/// Ensure relative joins extend the base path instead of replacing its last
/// segment.
fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn parse_identity(body: &[u8]) -> Result<Identity, SessionApiError> {
    let decoded: IdentityDto = serde_json::from_slice(body).map_err(|error| {
        SessionApiError::decode(format!("invalid identity payload: {error}"))
    })?;
    decoded.into_domain().map_err(SessionApiError::decode)
}

fn map_transport_error(error: reqwest::Error) -> SessionApiError {
    if error.is_timeout() {
        SessionApiError::timeout(error.to_string())
    } else {
        SessionApiError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> SessionApiError {
    let message = serde_json::from_slice::<ErrorBodyDto>(body)
        .ok()
        .and_then(ErrorBodyDto::into_message);
    match message {
        Some(message) => SessionApiError::rejected(status.as_u16(), message),
        None => SessionApiError::status(status.as_u16()),
    }
}
