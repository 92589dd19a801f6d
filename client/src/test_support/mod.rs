//! Test utilities for the client crate.
//!
//! Shared doubles for unit tests (in `src/`) and integration tests (in
//! `tests/`). Compiled for tests and when the `test-support` feature is on.

mod presentation;
mod realtime;
mod session_api;
mod time;

use std::time::Duration;

pub use presentation::{RecordingAlertSink, RecordingAudioCue, SinkEntry};
pub use realtime::{ConnectGate, EmitGate, FakeRealtime, JournalEntry};
pub use session_api::{ApiCall, Gate, ScriptedSessionApi};
pub use time::{ImmediateSleeper, MutableClock, NoJitter, RecordingSleeper};

/// Poll `check` until it holds or two seconds pass; returns the final result.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
