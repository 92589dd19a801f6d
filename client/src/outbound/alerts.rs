//! Alert sink that renders alerts as structured log lines.
//!
//! Suited to the headless notifier binary, where the terminal is the only
//! surface. Expiry needs no action: a log line cannot be taken back.

use tracing::{debug, info};

use crate::domain::ports::AlertSink;
use crate::domain::{Alert, AlertId};

/// Writes every shown alert at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn show(&self, alert: &Alert) {
        info!(
            alert_id = %alert.id,
            level = ?alert.level,
            auto_dismiss_ms = u64::try_from(alert.auto_dismiss.as_millis()).unwrap_or(u64::MAX),
            raised_at = %alert.raised_at,
            "{}",
            alert.message
        );
    }

    fn dismiss(&self, id: AlertId) {
        debug!(alert_id = %id, "alert dismissed early");
    }
}
