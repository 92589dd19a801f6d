//! Admission of user-visible alerts.
//!
//! Hire events can arrive in bursts; [`AlertBoard`] keeps the number of alerts
//! on screen bounded and gives each one a finite lifetime.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

/// Default time an alert stays visible.
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(5);
/// Default cap on simultaneously visible alerts.
pub const DEFAULT_MAX_VISIBLE: usize = 3;

/// Identifier of a shown alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Visual tone of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Positive outcome, e.g. being hired.
    Success,
}

/// Alert handed to an [`AlertSink`](crate::domain::ports::AlertSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Identifier used for early dismissal.
    pub id: AlertId,
    /// Visual tone.
    pub level: AlertLevel,
    /// Text shown to the user.
    pub message: String,
    /// How long the alert stays visible.
    pub auto_dismiss: Duration,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

/// Display limits for alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Lifetime of each alert.
    pub auto_dismiss: Duration,
    /// Maximum alerts visible at once; values below one are treated as one.
    pub max_visible: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            auto_dismiss: DEFAULT_AUTO_DISMISS,
            max_visible: DEFAULT_MAX_VISIBLE,
        }
    }
}

/// Result of admitting a new alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Alert to show.
    pub alert: Alert,
    /// Visible alerts that must be dismissed to respect the cap, oldest first.
    pub evicted: Vec<AlertId>,
}

/// Tracks visible alerts and enforces [`AlertPolicy`].
#[derive(Debug, Clone)]
pub struct AlertBoard {
    policy: AlertPolicy,
    visible: VecDeque<(AlertId, DateTime<Utc>)>,
}

impl AlertBoard {
    /// Build an empty board.
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy: AlertPolicy {
                auto_dismiss: policy.auto_dismiss,
                max_visible: policy.max_visible.max(1),
            },
            visible: VecDeque::new(),
        }
    }

    /// Number of alerts currently considered visible.
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Admit a new success alert raised at `now`.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use chrono::Utc;
    /// use gigflow_client::domain::{AlertBoard, AlertPolicy};
    ///
    /// let mut board = AlertBoard::new(AlertPolicy { auto_dismiss: Duration::from_secs(5), max_visible: 1 });
    /// let now = Utc::now();
    /// let first = board.admit("one", now);
    /// let second = board.admit("two", now);
    /// assert_eq!(second.evicted, vec![first.alert.id]);
    /// ```
    pub fn admit(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Admission {
        self.forget_expired(now);

        let mut evicted = Vec::new();
        while self.visible.len() >= self.policy.max_visible {
            match self.visible.pop_front() {
                Some((id, _)) => evicted.push(id),
                None => break,
            }
        }

        let alert = Alert {
            id: AlertId::random(),
            level: AlertLevel::Success,
            message: message.into(),
            auto_dismiss: self.policy.auto_dismiss,
            raised_at: now,
        };
        self.visible.push_back((alert.id, now));
        Admission { alert, evicted }
    }

    fn forget_expired(&mut self, now: DateTime<Utc>) {
        let lifetime = TimeDelta::from_std(self.policy.auto_dismiss).unwrap_or(TimeDelta::MAX);
        self.visible.retain(|(_, raised_at)| {
            raised_at
                .checked_add_signed(lifetime)
                .is_none_or(|deadline| deadline > now)
        });
    }
}
