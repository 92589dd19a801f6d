//! Supervisor behaviour against the in-memory realtime fake.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use rstest::{fixture, rstest};
use serde_json::json;
use tokio::sync::watch;

use super::*;
use crate::domain::notification::{HIRED_EVENT, HIRED_FALLBACK_MESSAGE, JOIN_EVENT};
use crate::test_support::{
    FakeRealtime, ImmediateSleeper, JournalEntry, MutableClock, NoJitter, RecordingAlertSink,
    RecordingAudioCue, eventually,
};

struct Harness {
    fake: FakeRealtime,
    sink: Arc<RecordingAlertSink>,
    audio: Arc<RecordingAudioCue>,
    session: watch::Sender<SessionState>,
    handle: ChannelHandle,
}

impl Harness {
    fn sign_in(&self, id: &str) {
        let identity = Identity::try_from_strings(id, "Ada", None).expect("identity");
        self.session
            .send_modify(|state| state.set_identity(Some(identity)));
    }

    fn sign_out(&self) {
        self.session.send_modify(|state| state.set_identity(None));
    }

    async fn joined(&self, count: usize) {
        let fake = self.fake.clone();
        assert!(
            eventually(|| fake.joins().len() == count).await,
            "expected {count} joins, journal: {:?}",
            fake.journal()
        );
    }
}

#[fixture]
fn config() -> NotificationChannelConfig {
    NotificationChannelConfig {
        reconnect: ReconnectPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
        alerts: AlertPolicy::default(),
    }
}

fn spawn_with(fake: FakeRealtime, audio: RecordingAudioCue, config: NotificationChannelConfig) -> Harness {
    let sink = Arc::new(RecordingAlertSink::default());
    let audio = Arc::new(audio);
    let start = chrono::Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid time");
    let clock = Arc::new(MutableClock::new(start));
    let (session, receiver) = watch::channel(SessionState::default());
    let channel = NotificationChannel::new(
        Arc::new(fake.clone()),
        sink.clone(),
        audio.clone(),
        clock,
    )
    .with_config(config)
    .with_runtime(ReconnectRuntime {
        sleeper: Arc::new(ImmediateSleeper),
        jitter: Arc::new(NoJitter),
    });
    let handle = channel.spawn(receiver);
    Harness {
        fake,
        sink,
        audio,
        session,
        handle,
    }
}

fn spawn(config: NotificationChannelConfig) -> Harness {
    spawn_with(FakeRealtime::new(), RecordingAudioCue::default(), config)
}

fn position(journal: &[JournalEntry], wanted: &JournalEntry) -> usize {
    journal
        .iter()
        .position(|entry| entry == wanted)
        .unwrap_or_else(|| panic!("missing {wanted:?} in {journal:?}"))
}

#[rstest]
#[tokio::test]
async fn never_connects_without_an_identity(config: NotificationChannelConfig) {
    let harness = spawn(config);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(harness.fake.attempts(), 0);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn subscribes_before_joining_the_user_room(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    assert_eq!(
        harness.fake.journal(),
        vec![
            JournalEntry::Open { connection: 0 },
            JournalEntry::Subscribe {
                connection: 0,
                event: HIRED_EVENT.to_owned()
            },
            JournalEntry::Emit {
                connection: 0,
                event: JOIN_EVENT.to_owned(),
                payload: json!("u1")
            },
        ]
    );
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn each_event_raises_one_alert_with_fallback_text(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    assert!(harness.fake.push_event(HIRED_EVENT, json!({"message": "Hired for Logo"})));
    assert!(harness.fake.push_event(HIRED_EVENT, json!({})));

    let sink = harness.sink.clone();
    assert!(eventually(|| sink.shown().len() == 2).await);
    assert_eq!(
        sink.shown_messages(),
        vec!["Hired for Logo".to_owned(), HIRED_FALLBACK_MESSAGE.to_owned()]
    );
    let audio = harness.audio.clone();
    assert!(eventually(|| audio.plays() == 2).await);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn audio_failure_never_blocks_alerts(config: NotificationChannelConfig) {
    let harness = spawn_with(FakeRealtime::new(), RecordingAudioCue::failing(), config);
    harness.sign_in("u1");
    harness.joined(1).await;

    harness.fake.push_event(HIRED_EVENT, json!({"message": "one"}));
    harness.fake.push_event(HIRED_EVENT, json!({"message": "two"}));

    let sink = harness.sink.clone();
    assert!(eventually(|| sink.shown().len() == 2).await);
    assert_eq!(harness.audio.plays(), 2);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn alerts_beyond_the_cap_dismiss_the_oldest(mut config: NotificationChannelConfig) {
    config.alerts.max_visible = 2;
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    for n in 0..3 {
        harness.fake.push_event(HIRED_EVENT, json!({ "message": format!("gig {n}") }));
    }

    let sink = harness.sink.clone();
    assert!(eventually(|| sink.shown().len() == 3).await);
    let first = sink.shown()[0].id;
    assert_eq!(sink.dismissed(), vec![first]);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn switching_users_closes_the_old_binding_first(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("alice");
    harness.joined(1).await;
    harness.sign_in("bob");
    harness.joined(2).await;

    let journal = harness.fake.journal();
    let unsubscribed = position(
        &journal,
        &JournalEntry::Unsubscribe {
            connection: 0,
            event: HIRED_EVENT.to_owned(),
        },
    );
    let closed = position(&journal, &JournalEntry::Close { connection: 0 });
    let reopened = position(&journal, &JournalEntry::Open { connection: 1 });
    assert!(unsubscribed < closed);
    assert!(closed < reopened);
    assert_eq!(harness.fake.joins(), vec![json!("alice"), json!("bob")]);
    assert_eq!(harness.fake.open_connections(), 1);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn signing_out_releases_the_binding(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;
    harness.sign_out();

    let fake = harness.fake.clone();
    assert!(eventually(|| fake.closes() == 1).await);
    assert_eq!(fake.opens(), 1);
    assert_eq!(fake.open_connections(), 0);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn unrelated_state_changes_keep_the_binding(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    harness.session.send_modify(|state| state.set_loading(true));
    harness
        .session
        .send_modify(|state| state.set_error(Some("Login failed".to_owned())));
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(harness.fake.opens(), 1);
    assert_eq!(harness.fake.closes(), 0);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn shutdown_unsubscribes_then_closes(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    let fake = harness.fake.clone();
    harness.handle.shutdown().await;

    let journal = fake.journal();
    assert_eq!(
        &journal[journal.len() - 2..],
        &[
            JournalEntry::Unsubscribe {
                connection: 0,
                event: HIRED_EVENT.to_owned()
            },
            JournalEntry::Close { connection: 0 },
        ]
    );
}

#[rstest]
#[tokio::test]
async fn dropping_the_session_store_stops_the_channel(config: NotificationChannelConfig) {
    let Harness {
        fake,
        session,
        handle,
        ..
    } = spawn(config);
    let identity = Identity::try_from_strings("u1", "Ada", None).expect("identity");
    session.send_modify(|state| state.set_identity(Some(identity)));
    assert!(eventually(|| fake.joins().len() == 1).await);

    drop(session);

    assert!(eventually(|| handle.is_finished()).await);
    assert_eq!(fake.closes(), 1);
}

#[rstest]
#[tokio::test]
async fn initial_connect_retries_then_gives_up_silently(config: NotificationChannelConfig) {
    let fake = FakeRealtime::new();
    fake.fail_next_connects(100);
    let harness = spawn_with(fake, RecordingAudioCue::default(), config);
    harness.sign_in("u1");

    let fake = harness.fake.clone();
    assert!(eventually(|| fake.attempts() == 3).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fake.attempts(), 3);
    assert!(harness.sink.shown().is_empty());
    assert!(harness.session.borrow().identity().is_some());

    harness.sign_out();
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.sign_in("u1");
    assert!(eventually(|| fake.attempts() == 6).await);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn transport_loss_reconnects_and_rejoins(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    harness.fake.drop_connection();
    harness.joined(2).await;

    assert_eq!(harness.fake.opens(), 2);
    assert_eq!(harness.fake.closes(), 1);
    assert_eq!(harness.fake.joins(), vec![json!("u1"), json!("u1")]);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn reconnect_after_loss_is_bounded(config: NotificationChannelConfig) {
    let harness = spawn(config);
    harness.sign_in("u1");
    harness.joined(1).await;

    harness.fake.fail_next_connects(100);
    harness.fake.drop_connection();

    let fake = harness.fake.clone();
    assert!(eventually(|| fake.attempts() == 3).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fake.attempts(), 3);
    assert_eq!(fake.open_connections(), 0);
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn identity_change_abandons_a_pending_connect(config: NotificationChannelConfig) {
    let harness = spawn(config);
    let _gate = harness.fake.hold_connects();
    harness.sign_in("u1");

    let fake = harness.fake.clone();
    assert!(eventually(|| fake.attempts() == 1).await);
    harness.sign_out();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(fake.opens(), 0);
    assert!(fake.joins().is_empty());
    harness.handle.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn identity_change_during_join_closes_without_joining(config: NotificationChannelConfig) {
    let harness = spawn(config);
    let gate = harness.fake.hold_emits();
    harness.sign_in("alice");

    let fake = harness.fake.clone();
    assert!(eventually(|| fake.held_emits() == 1).await);
    harness.sign_in("bob");
    assert!(eventually(|| fake.held_emits() == 2).await);

    assert_eq!(fake.closes(), 1);
    assert_eq!(
        fake.journal()[..3],
        [
            JournalEntry::Open { connection: 0 },
            JournalEntry::Subscribe {
                connection: 0,
                event: HIRED_EVENT.to_owned()
            },
            JournalEntry::Close { connection: 0 },
        ]
    );

    gate.release();
    harness.joined(1).await;
    assert_eq!(fake.joins(), vec![json!("bob")]);
    assert!(!fake.journal().iter().any(|entry| matches!(
        entry,
        JournalEntry::Emit { connection: 0, .. }
    )));
    assert_eq!(fake.closes(), 1);
    harness.handle.shutdown().await;
}
