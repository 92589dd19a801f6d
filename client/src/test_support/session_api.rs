//! Scripted session API with optional gates for ordering tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::ports::{SessionApi, SessionApiError};
use crate::domain::{Identity, LoginCredentials, RegistrationProfile};

/// Calls observed by [`ScriptedSessionApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CurrentIdentity,
    Login { identifier: String },
    Register { name: String, identifier: String },
    Logout,
}

/// Holds a scripted response back until opened.
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn open(self) {
        // The waiting call may already have been dropped.
        self.0.send(()).unwrap_or_default();
    }
}

struct Step<T> {
    outcome: Result<T, SessionApiError>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Step<T> {
    async fn resolve(self) -> Result<T, SessionApiError> {
        if let Some(gate) = self.gate {
            gate.await.unwrap_or_default();
        }
        self.outcome
    }
}

struct Queue<T>(VecDeque<Step<T>>);

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

impl<T> Queue<T> {
    fn push(&mut self, outcome: Result<T, SessionApiError>) {
        self.0.push_back(Step {
            outcome,
            gate: None,
        });
    }

    fn push_gated(&mut self, outcome: Result<T, SessionApiError>) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.0.push_back(Step {
            outcome,
            gate: Some(receiver),
        });
        Gate(sender)
    }

    fn next(&mut self, endpoint: &str) -> Step<T> {
        self.0.pop_front().unwrap_or_else(|| Step {
            outcome: Err(SessionApiError::transport(format!(
                "no scripted response for {endpoint}"
            ))),
            gate: None,
        })
    }
}

#[derive(Default)]
struct Script {
    current_identity: Queue<Identity>,
    login: Queue<Identity>,
    register: Queue<Identity>,
    logout: Queue<()>,
    calls: Vec<ApiCall>,
}

/// Session API answering from per-endpoint queues of outcomes.
///
/// Unscripted calls fail with a transport error.
#[derive(Default)]
pub struct ScriptedSessionApi(Mutex<Script>);

impl ScriptedSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        match self.0.lock() {
            Ok(script) => script,
            Err(_) => panic!("session script mutex"),
        }
    }

    pub fn push_current_identity(&self, outcome: Result<Identity, SessionApiError>) {
        self.script().current_identity.push(outcome);
    }

    pub fn gate_current_identity(&self, outcome: Result<Identity, SessionApiError>) -> Gate {
        self.script().current_identity.push_gated(outcome)
    }

    pub fn push_login(&self, outcome: Result<Identity, SessionApiError>) {
        self.script().login.push(outcome);
    }

    pub fn gate_login(&self, outcome: Result<Identity, SessionApiError>) -> Gate {
        self.script().login.push_gated(outcome)
    }

    pub fn push_register(&self, outcome: Result<Identity, SessionApiError>) {
        self.script().register.push(outcome);
    }

    pub fn push_logout(&self, outcome: Result<(), SessionApiError>) {
        self.script().logout.push(outcome);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.script().calls.clone()
    }
}

#[async_trait]
impl SessionApi for ScriptedSessionApi {
    async fn current_identity(&self) -> Result<Identity, SessionApiError> {
        let step = {
            let mut script = self.script();
            script.calls.push(ApiCall::CurrentIdentity);
            script.current_identity.next("GET /auth/me")
        };
        step.resolve().await
    }

    async fn login(&self, credentials: &LoginCredentials) -> Result<Identity, SessionApiError> {
        let step = {
            let mut script = self.script();
            script.calls.push(ApiCall::Login {
                identifier: credentials.identifier().to_owned(),
            });
            script.login.next("POST /auth/login")
        };
        step.resolve().await
    }

    async fn register(&self, profile: &RegistrationProfile) -> Result<Identity, SessionApiError> {
        let step = {
            let mut script = self.script();
            script.calls.push(ApiCall::Register {
                name: profile.name().as_ref().to_owned(),
                identifier: profile.identifier().to_owned(),
            });
            script.register.next("POST /auth/register")
        };
        step.resolve().await
    }

    async fn logout(&self) -> Result<(), SessionApiError> {
        let step = {
            let mut script = self.script();
            script.calls.push(ApiCall::Logout);
            script.logout.next("POST /auth/logout")
        };
        step.resolve().await
    }
}
