//! Wire shapes for the session endpoints.
//!
//! Bodies decode into these DTOs first and are validated into domain types in
//! one pass, so a body missing an id or name never yields a partial identity.

use serde::{Deserialize, Serialize};

use crate::domain::{Identity, LoginCredentials, RegistrationProfile};

#[derive(Debug, Deserialize)]
pub(super) struct IdentityDto {
    #[serde(alias = "_id")]
    pub(super) id: String,
    pub(super) name: String,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl IdentityDto {
    pub(super) fn into_domain(self) -> Result<Identity, String> {
        Identity::try_from_strings(self.id, self.name, self.email)
            .map_err(|error| format!("invalid identity: {error}"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBodyDto {
    #[serde(default)]
    pub(super) message: Option<String>,
}

impl ErrorBodyDto {
    /// Non-blank server message, if any.
    pub(super) fn into_message(self) -> Option<String> {
        self.message.filter(|message| !message.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub(super) struct LoginRequest<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

impl<'a> From<&'a LoginCredentials> for LoginRequest<'a> {
    fn from(credentials: &'a LoginCredentials) -> Self {
        Self {
            email: credentials.identifier(),
            password: credentials.secret(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct RegisterRequest<'a> {
    pub(super) name: &'a str,
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

impl<'a> From<&'a RegistrationProfile> for RegisterRequest<'a> {
    fn from(profile: &'a RegistrationProfile) -> Self {
        Self {
            name: profile.name().as_ref(),
            email: profile.identifier(),
            password: profile.secret(),
        }
    }
}
