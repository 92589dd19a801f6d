//! Background supervisor binding the realtime channel to the signed-in user.
//!
//! The supervisor is the only owner of the transport. It watches the session
//! state, joins the user's room once an identity is known, turns hire events
//! into alerts, and tears the binding down when the identity goes away or
//! changes. Connection failures are retried with jittered exponential backoff
//! and are never shown to the user.

use std::sync::Arc;

use mockable::Clock;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::alerts::{AlertBoard, AlertPolicy};
use super::notification::NotificationEvent;
use super::ports::{AlertSink, AudioCue, RealtimeConnector, TransportError};
use super::reconnect::{ReconnectPolicy, ReconnectRuntime};
use super::{Identity, SessionState, UserId};

mod binding;
#[cfg(test)]
mod tests;

pub use binding::ChannelBinding;

/// Tunables for [`NotificationChannel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationChannelConfig {
    /// Retry limits for connecting and reconnecting.
    pub reconnect: ReconnectPolicy,
    /// Alert lifetime and visibility cap.
    pub alerts: AlertPolicy,
}

/// Realtime notification listener bound to the session identity.
///
/// # Examples
/// ```rust,ignore
/// let channel = NotificationChannel::new(connector, sink, audio, Arc::new(DefaultClock));
/// let handle = channel.spawn(store.subscribe());
/// // ...
/// handle.shutdown().await;
/// ```
pub struct NotificationChannel {
    connector: Arc<dyn RealtimeConnector>,
    alerts: Arc<dyn AlertSink>,
    audio: Arc<dyn AudioCue>,
    clock: Arc<dyn Clock>,
    runtime: ReconnectRuntime,
    config: NotificationChannelConfig,
}

impl NotificationChannel {
    /// Build a channel with default policies and real sleeping.
    pub fn new(
        connector: Arc<dyn RealtimeConnector>,
        alerts: Arc<dyn AlertSink>,
        audio: Arc<dyn AudioCue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connector,
            alerts,
            audio,
            clock,
            runtime: ReconnectRuntime::default(),
            config: NotificationChannelConfig::default(),
        }
    }

    /// Replace the reconnect and alert policies.
    #[must_use]
    pub fn with_config(mut self, config: NotificationChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the sleeper and jitter used between attempts.
    #[must_use]
    pub fn with_runtime(mut self, runtime: ReconnectRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Start supervising on the current Tokio runtime.
    ///
    /// The supervisor stops when the handle is shut down or dropped, or when
    /// the session store goes away.
    pub fn spawn(self, session: watch::Receiver<SessionState>) -> ChannelHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let supervisor = Supervisor::from(self);
        let task = tokio::spawn(supervisor.run(session, shutdown_rx));
        ChannelHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owner handle for a spawned [`NotificationChannel`].
pub struct ChannelHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Stop the supervisor and wait until its binding is released.
    pub async fn shutdown(mut self) {
        self.signal();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(error) = task.await {
            warn!(error = %error, "notification channel task failed");
        }
    }

    /// Whether the supervisor task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn signal(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        if shutdown.send(()).is_err() {
            debug!("notification channel already stopped");
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

#[derive(Debug, Clone, Copy)]
enum Stop {
    Shutdown,
    SessionClosed,
}

enum Establishing {
    Bound(ChannelBinding),
    Exhausted,
    Superseded,
    Stopped(Stop),
}

enum Wake {
    Event(Value),
    Lost,
    SessionChanged,
    Stopped(Stop),
}

fn signed_in_user(state: &SessionState) -> Option<UserId> {
    state.identity().map(|identity| identity.id().clone())
}

struct Presenter {
    alerts: Arc<dyn AlertSink>,
    audio: Arc<dyn AudioCue>,
    clock: Arc<dyn Clock>,
    board: AlertBoard,
}

impl Presenter {
    async fn present(&mut self, payload: &Value) {
        let event = NotificationEvent::from_payload(payload);
        let admission = self.board.admit(event.alert_text(), self.clock.utc());
        for id in &admission.evicted {
            self.alerts.dismiss(*id);
        }
        self.alerts.show(&admission.alert);
        info!(alert_id = %admission.alert.id, "hire alert shown");

        if let Err(error) = self.audio.play().await {
            debug!(error = %error, "audio cue failed");
        }
    }
}

struct Supervisor {
    connector: Arc<dyn RealtimeConnector>,
    runtime: ReconnectRuntime,
    reconnect: ReconnectPolicy,
    presenter: Presenter,
}

impl From<NotificationChannel> for Supervisor {
    fn from(channel: NotificationChannel) -> Self {
        let NotificationChannel {
            connector,
            alerts,
            audio,
            clock,
            runtime,
            config,
        } = channel;
        Self {
            connector,
            runtime,
            reconnect: config.reconnect,
            presenter: Presenter {
                alerts,
                audio,
                clock,
                board: AlertBoard::new(config.alerts),
            },
        }
    }
}

impl Supervisor {
    async fn run(
        mut self,
        mut session: watch::Receiver<SessionState>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut binding: Option<ChannelBinding> = None;
        let mut recovering: Option<UserId> = None;
        let mut exhausted: Option<UserId> = None;

        let stop = loop {
            let desired = signed_in_user(&session.borrow_and_update());

            if let Some(stale) = binding.take_if(|bound| Some(bound.user()) != desired.as_ref()) {
                stale.release();
            }
            if exhausted != desired {
                exhausted = None;
            }
            if recovering != desired {
                recovering = None;
            }

            let pending =
                desired.filter(|user| binding.is_none() && exhausted.as_ref() != Some(user));
            if let Some(user) = pending {
                let first_attempt = u32::from(recovering.take().is_some());
                let outcome = tokio::select! {
                    _ = &mut shutdown => Establishing::Stopped(Stop::Shutdown),
                    changed = session.wait_for(|state| state.identity().map(Identity::id) != Some(&user)) => {
                        match changed {
                            Ok(_) => Establishing::Superseded,
                            Err(_) => Establishing::Stopped(Stop::SessionClosed),
                        }
                    }
                    bound = self.establish(&user, first_attempt) => {
                        bound.map_or(Establishing::Exhausted, Establishing::Bound)
                    }
                };
                match outcome {
                    Establishing::Bound(bound) => {
                        info!(user_id = %user, protocol = %bound.protocol(), "notification channel joined");
                        binding = Some(bound);
                    }
                    Establishing::Exhausted => {
                        warn!(user_id = %user, "notification channel unavailable; waiting for the next identity change");
                        exhausted = Some(user);
                    }
                    Establishing::Superseded => {
                        debug!(user_id = %user, "identity changed while connecting; attempt abandoned");
                    }
                    Establishing::Stopped(stop) => break stop,
                }
                continue;
            }

            let wake = match binding.as_mut() {
                Some(bound) => tokio::select! {
                    _ = &mut shutdown => Wake::Stopped(Stop::Shutdown),
                    changed = session.changed() => {
                        changed.map_or(Wake::Stopped(Stop::SessionClosed), |()| Wake::SessionChanged)
                    }
                    payload = bound.next_event() => payload.map_or(Wake::Lost, Wake::Event),
                },
                None => tokio::select! {
                    _ = &mut shutdown => Wake::Stopped(Stop::Shutdown),
                    changed = session.changed() => {
                        changed.map_or(Wake::Stopped(Stop::SessionClosed), |()| Wake::SessionChanged)
                    }
                },
            };

            match wake {
                Wake::Event(payload) => self.presenter.present(&payload).await,
                Wake::Lost => {
                    if let Some(lost) = binding.take() {
                        warn!(user_id = %lost.user(), "notification channel lost; reconnecting");
                        recovering = Some(lost.user().clone());
                        lost.release();
                    }
                }
                Wake::SessionChanged => {}
                Wake::Stopped(stop) => break stop,
            }
        };

        if let Some(bound) = binding.take() {
            bound.release();
        }
        debug!(reason = ?stop, "notification channel stopped");
    }

    /// Connect and join for `user`, retrying per the reconnect policy.
    ///
    /// Attempt zero runs immediately; every later attempt waits for the
    /// jittered backoff first. Recovery after a loss starts at attempt one.
    async fn establish(&self, user: &UserId, first_attempt: u32) -> Option<ChannelBinding> {
        let policy = self.reconnect;
        for attempt in first_attempt..=policy.max_attempts {
            if attempt > 0 {
                let delay = self
                    .runtime
                    .jitter
                    .jittered_delay(policy.base_delay(attempt), attempt);
                debug!(user_id = %user, attempt, ?delay, "retrying notification channel");
                self.runtime.sleeper.sleep(delay).await;
            }
            match self.connect_and_join(user).await {
                Ok(bound) => return Some(bound),
                Err(error) => {
                    debug!(user_id = %user, attempt, error = %error, "notification channel attempt failed");
                }
            }
        }
        None
    }

    async fn connect_and_join(&self, user: &UserId) -> Result<ChannelBinding, TransportError> {
        let transport = self.connector.connect().await?;
        ChannelBinding::join(transport, user.clone()).await
    }
}
