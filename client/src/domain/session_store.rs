//! Process-wide session store.
//!
//! Owns the current identity plus loading and error state, publishes every
//! change through a `watch` channel, and exposes the session commands. Each
//! command takes a ticket when it starts, and overlapping outcomes are
//! reconciled against a ledger:
//!
//! - A successful sign-in always lands unless a sign-out that started after
//!   it has already settled; the caller then gets
//!   [`SessionError::Superseded`].
//! - A sign-out clears the identity unless a sign-in that started after it
//!   has already landed.
//! - A failed session check clears the identity only when no identity was written
//!   while it was in flight.
//! - Error text follows start order: the latest-started command wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::{
    LOGIN_FAILED, LOGOUT_FAILED, REGISTRATION_FAILED, SESSION_CHECK_FAILED, SessionError,
};
use super::ports::{SessionApi, SessionApiError};
use super::{Identity, LoginCredentials, RegistrationProfile, SessionState};

#[derive(Debug, Default)]
struct Ledger {
    issued: u64,
    loading_calls: usize,
    error_written: u64,
    /// Newest ticket among the sign-ins that wrote an identity.
    signed_in_by: u64,
    /// Newest ticket among settled sign-outs.
    signed_out_by: u64,
    /// Count of identity writes; session checks compare it with their start value.
    identity_writes: u64,
}

impl Ledger {
    fn resolve(&mut self, write: IdentityWrite, ticket: u64, writes_at_start: u64) -> Resolution {
        match write {
            IdentityWrite::Keep => Resolution::Unchanged,
            IdentityWrite::SignIn(_) if self.signed_out_by > ticket => Resolution::Superseded,
            IdentityWrite::SignIn(identity) => {
                self.signed_in_by = self.signed_in_by.max(ticket);
                self.record_identity_write(Some(identity))
            }
            IdentityWrite::CheckMissed if self.identity_writes != writes_at_start => {
                Resolution::Unchanged
            }
            IdentityWrite::CheckMissed => self.record_identity_write(None),
            IdentityWrite::SignOut => {
                self.signed_out_by = self.signed_out_by.max(ticket);
                if self.signed_in_by > ticket {
                    Resolution::Unchanged
                } else {
                    self.record_identity_write(None)
                }
            }
        }
    }

    fn record_identity_write(&mut self, identity: Option<Identity>) -> Resolution {
        self.identity_writes = self.identity_writes.saturating_add(1);
        Resolution::Set(identity)
    }
}

/// Identity effect requested by a settling command.
enum IdentityWrite {
    Keep,
    SignIn(Identity),
    CheckMissed,
    SignOut,
}

#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    Unchanged,
    Set(Option<Identity>),
    Superseded,
}

enum FieldWrite<T> {
    Keep,
    Replace(T),
}

impl<T> FieldWrite<T> {
    fn claim(self, ticket: u64, last_written: &mut u64) -> Option<T> {
        match self {
            Self::Keep => None,
            Self::Replace(value) if ticket > *last_written => {
                *last_written = ticket;
                Some(value)
            }
            Self::Replace(_) => None,
        }
    }
}

struct Settlement {
    identity: IdentityWrite,
    error: FieldWrite<Option<String>>,
}

impl Settlement {
    fn signed_in(identity: Identity) -> Self {
        Self {
            identity: IdentityWrite::SignIn(identity),
            error: FieldWrite::Replace(None),
        }
    }

    fn check_missed() -> Self {
        Self {
            identity: IdentityWrite::CheckMissed,
            error: FieldWrite::Keep,
        }
    }

    fn signed_out() -> Self {
        Self {
            identity: IdentityWrite::SignOut,
            error: FieldWrite::Keep,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            identity: IdentityWrite::Keep,
            error: FieldWrite::Replace(Some(message.to_owned())),
        }
    }

    fn error_cleared() -> Self {
        Self {
            identity: IdentityWrite::Keep,
            error: FieldWrite::Replace(None),
        }
    }

    fn abandoned() -> Self {
        Self {
            identity: IdentityWrite::Keep,
            error: FieldWrite::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Check,
    SignIn,
    SignOut,
    Form,
}

impl OperationKind {
    fn tracks_loading(self) -> bool {
        matches!(self, Self::Check | Self::SignIn)
    }

    /// Settling tells readers whether a session exists.
    fn resolves_session(self) -> bool {
        matches!(self, Self::Check | Self::SignOut)
    }
}

/// In-flight session command. Dropping it unsettled releases `loading` and
/// nothing else.
struct PendingOperation<'a> {
    store: &'a SessionStore,
    operation: &'static str,
    kind: OperationKind,
    ticket: u64,
    identity_writes: u64,
    settled: bool,
}

impl PendingOperation<'_> {
    /// Apply `settlement`; `false` means a later sign-out superseded it.
    fn settle(mut self, settlement: Settlement) -> bool {
        self.settled = true;
        self.store.apply(&self, settlement)
    }
}

impl Drop for PendingOperation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(operation = self.operation, ticket = self.ticket, "session operation abandoned");
            self.store.apply(self, Settlement::abandoned());
        }
    }
}

/// Single source of truth for the signed-in user.
///
/// # Examples
/// ```rust,ignore
/// let store = SessionStore::new(Arc::new(api));
/// let mut state = store.subscribe();
/// store.bootstrap().await.ok();
/// assert!(state.borrow_and_update().is_checked());
/// ```
pub struct SessionStore {
    api: Arc<dyn SessionApi>,
    state: watch::Sender<SessionState>,
    ledger: Mutex<Ledger>,
}

impl SessionStore {
    /// Build a signed-out store that has not checked the server yet.
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            state,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Check whether the server-side session is still valid.
    ///
    /// Failure clears the identity without recording an error in the state;
    /// the returned error only tells the caller there is no session.
    pub async fn bootstrap(&self) -> Result<Identity, SessionError> {
        let pending = self.begin("bootstrap", OperationKind::Check);
        match self.api.current_identity().await {
            Ok(identity) => {
                if pending.settle(Settlement::signed_in(identity.clone())) {
                    info!(user_id = %identity.id(), "session restored");
                    Ok(identity)
                } else {
                    Err(SessionError::Superseded)
                }
            }
            Err(error) => {
                debug!(error = %error, "no active session");
                pending.settle(Settlement::check_missed());
                Err(SessionError::from_api(error, SESSION_CHECK_FAILED))
            }
        }
    }

    /// Sign in with credentials. Failure leaves the identity untouched.
    pub async fn authenticate(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Identity, SessionError> {
        let pending = self.begin("authenticate", OperationKind::SignIn);
        let outcome = self.api.login(credentials).await;
        Self::finish_sign_in(pending, outcome, LOGIN_FAILED)
    }

    /// Create an account and sign in. Failure leaves the identity untouched.
    pub async fn register(&self, profile: &RegistrationProfile) -> Result<Identity, SessionError> {
        let pending = self.begin("register", OperationKind::SignIn);
        let outcome = self.api.register(profile).await;
        Self::finish_sign_in(pending, outcome, REGISTRATION_FAILED)
    }

    /// Sign out. The identity is cleared whatever the server answers, unless
    /// a sign-in started after this call has already landed.
    pub async fn deauthenticate(&self) -> Result<(), SessionError> {
        let pending = self.begin("deauthenticate", OperationKind::SignOut);
        let outcome = self.api.logout().await;
        pending.settle(Settlement::signed_out());
        match outcome {
            Ok(()) => {
                info!("signed out");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "logout call failed; identity cleared locally");
                Err(SessionError::from_api(error, LOGOUT_FAILED))
            }
        }
    }

    /// Dismiss the current form error.
    pub fn clear_error(&self) {
        self.begin("clear_error", OperationKind::Form)
            .settle(Settlement::error_cleared());
    }

    fn finish_sign_in(
        pending: PendingOperation<'_>,
        outcome: Result<Identity, SessionApiError>,
        fallback: &str,
    ) -> Result<Identity, SessionError> {
        let operation = pending.operation;
        match outcome {
            Ok(identity) => {
                if pending.settle(Settlement::signed_in(identity.clone())) {
                    info!(operation, user_id = %identity.id(), "signed in");
                    Ok(identity)
                } else {
                    Err(SessionError::Superseded)
                }
            }
            Err(error) => {
                let failure = SessionError::from_api(error, fallback);
                match &failure {
                    SessionError::Rejected { status, message } => {
                        info!(operation, status, message = %message, "session request rejected");
                    }
                    SessionError::Unavailable { detail, .. } => {
                        warn!(operation, detail = %detail, "session request failed");
                    }
                    SessionError::Superseded => {}
                }
                pending.settle(Settlement::failed(failure.message()));
                Err(failure)
            }
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: &'static str, kind: OperationKind) -> PendingOperation<'_> {
        let mut ledger = self.ledger();
        ledger.issued = ledger.issued.saturating_add(1);
        let ticket = ledger.issued;
        if kind.tracks_loading() {
            ledger.loading_calls = ledger.loading_calls.saturating_add(1);
            self.state.send_modify(|state| state.set_loading(true));
        }
        PendingOperation {
            store: self,
            operation,
            kind,
            ticket,
            identity_writes: ledger.identity_writes,
            settled: false,
        }
    }

    fn apply(&self, pending: &PendingOperation<'_>, settlement: Settlement) -> bool {
        let mut ledger = self.ledger();
        if pending.kind.tracks_loading() {
            ledger.loading_calls = ledger.loading_calls.saturating_sub(1);
        }
        let loading = ledger.loading_calls > 0;
        let resolution = ledger.resolve(settlement.identity, pending.ticket, pending.identity_writes);
        let superseded = resolution == Resolution::Superseded;
        let error = if superseded {
            debug!(operation = pending.operation, ticket = pending.ticket, "sign-in superseded by a later sign-out");
            None
        } else {
            settlement.error.claim(pending.ticket, &mut ledger.error_written)
        };
        let resolves = pending.kind.resolves_session();

        self.state.send_modify(|state| {
            state.set_loading(loading);
            if resolves {
                state.mark_checked();
            }
            if let Resolution::Set(identity) = resolution {
                state.set_identity(identity);
            }
            if let Some(error) = error {
                state.set_error(error);
            }
        });
        !superseded
    }
}
