//! Credential payloads submitted by the login and registration forms.
//!
//! Keep form parsing outside the session store by exposing constructors that
//! validate raw strings before a store operation talks to the session port.

use std::fmt;

use zeroize::Zeroizing;

use super::identity::DisplayName;

/// Error returned when credential form values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsValidationError {
    /// Identifier (email) was missing or blank once trimmed.
    EmptyIdentifier,
    /// Secret (password) was blank.
    EmptySecret,
    /// Registration name was missing or blank once trimmed.
    EmptyName,
}

impl fmt::Display for CredentialsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "email must not be empty"),
            Self::EmptySecret => write!(f, "password must not be empty"),
            Self::EmptyName => write!(f, "name must not be empty"),
        }
    }
}

impl std::error::Error for CredentialsValidationError {}

fn normalise_identifier(identifier: &str) -> Result<String, CredentialsValidationError> {
    let normalized = identifier.trim();
    if normalized.is_empty() {
        return Err(CredentialsValidationError::EmptyIdentifier);
    }
    Ok(normalized.to_owned())
}

fn guard_secret(secret: &str) -> Result<Zeroizing<String>, CredentialsValidationError> {
    if secret.is_empty() {
        return Err(CredentialsValidationError::EmptySecret);
    }
    Ok(Zeroizing::new(secret.to_owned()))
}

/// Validated login credentials.
///
/// ## Invariants
/// - `identifier` is trimmed and must not be empty after trimming.
/// - `secret` must be non-empty but keeps caller-provided whitespace.
///
/// # Examples
/// ```
/// use gigflow_client::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts(" ada@example.com ", "hunter2").unwrap();
/// assert_eq!(creds.identifier(), "ada@example.com");
/// assert_eq!(creds.secret(), "hunter2");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    identifier: String,
    secret: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw identifier/secret inputs.
    pub fn try_from_parts(
        identifier: &str,
        secret: &str,
    ) -> Result<Self, CredentialsValidationError> {
        Ok(Self {
            identifier: normalise_identifier(identifier)?,
            secret: guard_secret(secret)?,
        })
    }

    /// Login identifier (the account email).
    pub fn identifier(&self) -> &str {
        self.identifier.as_str()
    }

    /// Secret provided by the caller.
    pub fn secret(&self) -> &str {
        self.secret.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Validated registration form.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationProfile {
    name: DisplayName,
    credentials: LoginCredentials,
}

impl RegistrationProfile {
    /// Construct a registration profile from raw form inputs.
    pub fn try_from_parts(
        name: &str,
        identifier: &str,
        secret: &str,
    ) -> Result<Self, CredentialsValidationError> {
        let name = DisplayName::new(name).map_err(|_| CredentialsValidationError::EmptyName)?;
        Ok(Self {
            name,
            credentials: LoginCredentials::try_from_parts(identifier, secret)?,
        })
    }

    /// Display name requested for the new account.
    pub fn name(&self) -> &DisplayName {
        &self.name
    }

    /// Account identifier.
    pub fn identifier(&self) -> &str {
        self.credentials.identifier()
    }

    /// Account secret.
    pub fn secret(&self) -> &str {
        self.credentials.secret()
    }
}

impl fmt::Debug for RegistrationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationProfile")
            .field("name", &self.name)
            .field("identifier", &self.identifier())
            .field("secret", &"<redacted>")
            .finish()
    }
}
