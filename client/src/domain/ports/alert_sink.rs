//! Driven port for presenting user-visible alerts.

use crate::domain::{Alert, AlertId};

/// Surface that renders alerts to the user (toast container, terminal, ...).
///
/// Implementations are expected to hide each alert once its
/// [`Alert::auto_dismiss`] duration elapses; `dismiss` is only called when an
/// alert must disappear early.
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send + Sync {
    /// Show a new alert.
    fn show(&self, alert: &Alert);

    /// Hide an alert before its auto-dismiss deadline.
    fn dismiss(&self, id: AlertId);
}
