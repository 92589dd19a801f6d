//! Reactive projection of the client session.

use super::identity::Identity;

/// Snapshot published by the session store to every reader.
///
/// ## Invariants
/// - `loading` is true only while a bootstrap, authenticate or register call
///   is in flight.
/// - `identity` is either a complete [`Identity`] or absent.
/// - `checked` starts false and becomes true, for good, once a bootstrap or a
///   sign-out has settled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    identity: Option<Identity>,
    loading: bool,
    error: Option<String>,
    checked: bool,
}

impl SessionState {
    /// Current identity, when signed in.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether a loading operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Error text from the most recent failed form submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether an identity is present.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether the store has learned if a server session exists.
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Decide what an identity-gated view should do right now.
    ///
    /// A signed-out store that has not checked yet waits, so a gate checked
    /// before bootstrap settles never redirects a user who has a session.
    ///
    /// # Examples
    /// ```
    /// use gigflow_client::domain::{RouteAccess, SessionState};
    ///
    /// assert_eq!(SessionState::default().route_access(), RouteAccess::Wait);
    /// ```
    pub fn route_access(&self) -> RouteAccess {
        if self.loading {
            RouteAccess::Wait
        } else if self.identity.is_some() {
            RouteAccess::Render
        } else if !self.checked {
            RouteAccess::Wait
        } else {
            RouteAccess::RedirectToLogin
        }
    }

    pub(crate) fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub(crate) fn mark_checked(&mut self) {
        self.checked = true;
    }
}

/// Gate decision for identity-gated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// The session outcome is not known yet; show a loading indicator.
    Wait,
    /// The user is signed in.
    Render,
    /// The user is signed out; send them to the login form.
    RedirectToLogin,
}
