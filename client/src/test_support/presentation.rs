//! Recording alert sink and audio cue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{AlertSink, AudioCue, AudioCueError};
use crate::domain::{Alert, AlertId};

/// What a [`RecordingAlertSink`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEntry {
    Shown(Alert),
    Dismissed(AlertId),
}

/// Alert sink that keeps every call in order.
#[derive(Default)]
pub struct RecordingAlertSink(Mutex<Vec<SinkEntry>>);

impl RecordingAlertSink {
    fn entries(&self) -> MutexGuard<'_, Vec<SinkEntry>> {
        match self.0.lock() {
            Ok(entries) => entries,
            Err(_) => panic!("alert sink mutex"),
        }
    }

    pub fn journal(&self) -> Vec<SinkEntry> {
        self.entries().clone()
    }

    /// Alerts shown so far, oldest first.
    pub fn shown(&self) -> Vec<Alert> {
        self.entries()
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Shown(alert) => Some(alert.clone()),
                SinkEntry::Dismissed(_) => None,
            })
            .collect()
    }

    pub fn shown_messages(&self) -> Vec<String> {
        self.shown().into_iter().map(|alert| alert.message).collect()
    }

    pub fn dismissed(&self) -> Vec<AlertId> {
        self.entries()
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Dismissed(id) => Some(*id),
                SinkEntry::Shown(_) => None,
            })
            .collect()
    }
}

impl AlertSink for RecordingAlertSink {
    fn show(&self, alert: &Alert) {
        self.entries().push(SinkEntry::Shown(alert.clone()));
    }

    fn dismiss(&self, id: AlertId) {
        self.entries().push(SinkEntry::Dismissed(id));
    }
}

/// Audio cue counting play requests, optionally failing each one.
#[derive(Default)]
pub struct RecordingAudioCue {
    plays: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingAudioCue {
    pub fn failing() -> Self {
        Self {
            plays: AtomicUsize::new(0),
            failing: AtomicBool::new(true),
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCue for RecordingAudioCue {
    async fn play(&self) -> Result<(), AudioCueError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(AudioCueError::playback("autoplay blocked"))
        } else {
            Ok(())
        }
    }
}
