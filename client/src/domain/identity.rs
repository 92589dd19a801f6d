//! Identity of the signed-in marketplace user.
//!
//! The server issues opaque identifiers (MongoDB object ids today), so
//! [`UserId`] only guarantees the value is non-empty and free of surrounding
//! whitespace. Owner and freelancer views are told apart by comparing ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors returned while building an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    EmptyId,
    InvalidId,
    EmptyDisplayName,
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::InvalidId => write!(f, "user id must not contain whitespace"),
            Self::EmptyDisplayName => write!(f, "display name must not be empty"),
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Stable, opaque user identifier.
///
/// # Examples
/// ```
/// use gigflow_client::domain::UserId;
///
/// let id = UserId::new("65f1c0ffee").unwrap();
/// assert_eq!(id.as_ref(), "65f1c0ffee");
/// assert!(UserId::new(" 65f1 ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and construct a [`UserId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    fn from_owned(id: String) -> Result<Self, IdentityValidationError> {
        if id.is_empty() {
            return Err(IdentityValidationError::EmptyId);
        }
        if id.chars().any(char::is_whitespace) {
            return Err(IdentityValidationError::InvalidId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Human readable name shown next to the user's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`]; surrounding whitespace is trimmed.
    pub fn new(name: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyDisplayName);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The authenticated user as known to the client.
///
/// ## Invariants
/// - Either fully present or absent: construction requires a valid id and
///   display name, so no partially populated identity can exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: UserId,
    name: DisplayName,
    email: Option<String>,
}

impl Identity {
    /// Build an identity from validated parts.
    pub fn new(id: UserId, name: DisplayName, email: Option<String>) -> Self {
        Self { id, name, email }
    }

    /// Validate raw strings into an identity.
    ///
    /// # Examples
    /// ```
    /// use gigflow_client::domain::Identity;
    ///
    /// let identity = Identity::try_from_strings("u-1", "Ada", None).unwrap();
    /// assert_eq!(identity.name().as_ref(), "Ada");
    /// ```
    pub fn try_from_strings(
        id: impl AsRef<str>,
        name: impl AsRef<str>,
        email: Option<String>,
    ) -> Result<Self, IdentityValidationError> {
        Ok(Self::new(UserId::new(id)?, DisplayName::new(name)?, email))
    }

    /// Stable identifier used for room joins and ownership checks.
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &DisplayName {
        &self.name
    }

    /// Email address, when the server returned one.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Whether this user owns a resource whose owner id is `owner`.
    pub fn owns(&self, owner: &UserId) -> bool {
        &self.id == owner
    }
}
