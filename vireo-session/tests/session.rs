mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use support::{Call, RecordingBackend, config, local_video, remote_video, settle, video_id};
use vireo_model::{PlaybackEvent, ProgressUpdate, RawTranscript, SavedProgress, VideoId};
use vireo_session::{
    BridgeCommand, BridgeMessage, LocalBackend, MediaElement, MemoryProgressStore,
    PlaybackSession, ProgressStore, RemoteBridgeBackend, ResumeState, ScrollMetrics,
    SegmentScroller, SessionDeps, SessionError, SessionSlot, SessionState, SimulatedMedia,
    StoreError, TranscriptOrigin, TranscriptResolver, channel_bridge,
};

const CUES: &str = "WEBVTT

00:00.000 --> 00:05.000
Hello there

00:05.000 --> 00:10.000
<v Narrator>General Kenobi</v>
";

fn deps(store: &Arc<MemoryProgressStore>) -> SessionDeps {
    SessionDeps {
        store: store.clone(),
        transcripts: TranscriptResolver::new(&config().transcript),
        scroller: None,
    }
}

/// Rows laid out 400px apart, all below a 100px viewport.
#[derive(Debug, Default)]
struct RecordingScroller {
    offsets: Mutex<Vec<f64>>,
}

impl SegmentScroller for RecordingScroller {
    fn metrics(&self, segment_index: usize) -> Option<ScrollMetrics> {
        Some(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 100.0,
            content_height: 1_000.0,
            element_top: 200.0 + 400.0 * segment_index as f64,
            element_height: 20.0,
        })
    }

    fn scroll_to(&self, scroll_top: f64) {
        self.offsets.lock().push(scroll_top);
    }
}

/// Store whose writes take ten seconds to land.
#[derive(Debug, Default)]
struct SlowStore {
    saved: Mutex<Vec<f64>>,
}

#[async_trait]
impl ProgressStore for SlowStore {
    async fn load(&self, _video_id: &VideoId) -> Result<Option<SavedProgress>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _video_id: &VideoId, update: &ProgressUpdate) -> Result<(), StoreError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        self.saved.lock().push(update.time_watched);
        Ok(())
    }
}

fn store_with_progress(id: &str, watched: f64, percentage: f64) -> Arc<MemoryProgressStore> {
    Arc::new(
        MemoryProgressStore::new().with_progress(video_id(id), SavedProgress::at(watched, percentage)),
    )
}

#[tokio::test(start_paused = true)]
async fn local_session_resumes_and_saves_progress() {
    let store = store_with_progress("lecture", 120.0, 20.0);
    let media = Arc::new(SimulatedMedia::new(600.0).with_load_delay(Duration::from_millis(500)));
    let backend = Arc::new(LocalBackend::from_config(media.clone(), &config()));

    let session = PlaybackSession::start(
        local_video("lecture", 600.0),
        backend,
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");
    assert_eq!(session.state(), SessionState::Loading);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(media.seek_history(), vec![120.0]);
    assert_eq!(media.play_count(), 1);
    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.resume_state(), ResumeState::Playing);

    tokio::time::sleep(Duration::from_secs(12)).await;
    let writes = store.writes();
    assert!(!writes.is_empty(), "no progress saved after 12s of playback");
    assert!(writes.iter().all(|(_, update)| update.time_watched > 120.0));

    session.pause().await.expect("pause");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.state(), SessionState::Paused);
    let saved = store.get(&video_id("lecture")).expect("record");
    assert!((saved.watched_seconds - media.position()).abs() < 0.5);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn captions_follow_the_playhead() {
    let store = Arc::new(MemoryProgressStore::new());
    let media = Arc::new(SimulatedMedia::new(10.0));
    let backend = Arc::new(LocalBackend::from_config(media.clone(), &config()));
    let meta = local_video("talk", 10.0).with_transcript("en", RawTranscript::from(CUES));

    let session = PlaybackSession::start(meta, backend, deps(&store), &config(), "en-US")
        .expect("session");
    let mut captions = session.watch_caption();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.segments().len(), 2);
    let transcript = session.watch_transcript().borrow().clone().expect("transcript");
    assert_eq!(transcript.origin, TranscriptOrigin::Embedded);
    assert_eq!(captions.borrow_and_update().as_deref(), Some("Hello there"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(captions.borrow_and_update().as_deref(), Some("General Kenobi"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.state(), SessionState::Ended);
    let saved = store.get(&video_id("talk")).expect("record");
    assert!(saved.completed);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn only_the_latest_active_row_is_scrolled_to() {
    let store = Arc::new(MemoryProgressStore::new());
    let scroller = Arc::new(RecordingScroller::default());
    let backend = RecordingBackend::local();
    let meta = local_video("talk", 10.0).with_transcript("en", RawTranscript::from(CUES));
    let deps = SessionDeps {
        scroller: Some(scroller.clone()),
        ..deps(&store)
    };

    let session = PlaybackSession::start(meta, backend.clone(), deps, &config(), "en")
        .expect("session");
    settle().await;

    backend.emit(PlaybackEvent::TimeUpdate { seconds: 1.0 });
    backend.emit(PlaybackEvent::TimeUpdate { seconds: 6.0 });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.active_segment().map(|segment| segment.text), Some("General Kenobi".into()));
    assert_eq!(*scroller.offsets.lock(), vec![560.0]);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn mismatched_backend_is_rejected() {
    let store = Arc::new(MemoryProgressStore::new());
    let result = PlaybackSession::start(
        remote_video("embed", 60.0),
        RecordingBackend::local(),
        deps(&store),
        &config(),
        "en",
    );
    assert!(matches!(result, Err(SessionError::BackendMismatch { .. })));
}

#[tokio::test(start_paused = true)]
async fn ready_before_start_is_not_lost() {
    let store = Arc::new(MemoryProgressStore::new());
    let backend = RecordingBackend::local();
    backend.make_ready();

    let session = PlaybackSession::start(
        local_video("early", 60.0),
        backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");
    settle().await;

    assert_eq!(backend.calls(), vec![Call::Play]);
    assert_eq!(session.state(), SessionState::Playing);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn user_play_before_ready_overrides_resume() {
    let store = store_with_progress("intro", 120.0, 20.0);
    let backend = RecordingBackend::local();
    let session = PlaybackSession::start(
        local_video("intro", 600.0),
        backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");

    session.play().await.expect("play");
    backend.make_ready();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(backend.calls(), vec![Call::Play]);
    assert_eq!(session.resume_state(), ResumeState::Overridden);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fatal_backend_error_requires_reload() {
    let store = Arc::new(MemoryProgressStore::new());
    let backend = RecordingBackend::local();
    let session = PlaybackSession::start(
        local_video("broken", 60.0),
        backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");

    backend.emit(PlaybackEvent::Error { fatal: false });
    settle().await;
    assert_eq!(session.state(), SessionState::Loading);

    backend.emit(PlaybackEvent::Error { fatal: true });
    settle().await;
    assert_eq!(session.state(), SessionState::ReloadRequired);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restart_after_end_replays_from_zero() {
    let store = Arc::new(MemoryProgressStore::new());
    let backend = RecordingBackend::local();
    let session = PlaybackSession::start(
        local_video("short", 30.0),
        backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");

    backend.make_ready();
    settle().await;
    assert_eq!(backend.calls(), vec![Call::Play]);

    backend.emit(PlaybackEvent::Play);
    backend.emit(PlaybackEvent::TimeUpdate { seconds: 29.8 });
    backend.emit(PlaybackEvent::Ended);
    settle().await;
    assert_eq!(session.state(), SessionState::Ended);
    assert!(store.get(&video_id("short")).expect("record").completed);

    session.restart().await.expect("restart");
    assert_eq!(
        backend.calls(),
        vec![Call::Play, Call::Seek(0.0), Call::Play]
    );
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent_and_silences_the_session() {
    let store = store_with_progress("closing", 120.0, 20.0);
    let backend = RecordingBackend::local();
    let session = PlaybackSession::start(
        local_video("closing", 600.0),
        backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");
    settle().await;

    session.shutdown().await;
    session.shutdown().await;
    assert!(backend.is_detached());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.play().await, Err(SessionError::Closed)));

    backend.make_ready();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(backend.calls().is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn replacing_a_session_tears_down_the_previous_one() {
    let store = Arc::new(MemoryProgressStore::new());
    let slot = SessionSlot::new();

    let first_backend = RecordingBackend::local();
    let first = PlaybackSession::start(
        local_video("first", 60.0),
        first_backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");
    let first = slot.replace(first).await;

    let second_backend = RecordingBackend::local();
    let second = PlaybackSession::start(
        local_video("second", 60.0),
        second_backend.clone(),
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");
    slot.replace(second).await;

    assert!(first.is_closed());
    assert!(first_backend.is_detached());
    let current = slot.current().await.expect("current session");
    assert_eq!(current.media().video_id, video_id("second"));

    first_backend.make_ready();
    second_backend.make_ready();
    settle().await;
    assert!(first_backend.calls().is_empty());
    assert_eq!(second_backend.calls(), vec![Call::Play]);

    slot.clear().await;
    assert!(second_backend.is_detached());
}

#[tokio::test(start_paused = true)]
async fn slow_saves_do_not_stall_event_handling() {
    let store = Arc::new(SlowStore::default());
    let backend = RecordingBackend::local();
    let meta = local_video("talk", 10.0).with_transcript("en", RawTranscript::from(CUES));
    let deps = SessionDeps {
        store: store.clone(),
        transcripts: TranscriptResolver::new(&config().transcript),
        scroller: None,
    };

    let session = PlaybackSession::start(meta, backend.clone(), deps, &config(), "en")
        .expect("session");
    backend.make_ready();
    settle().await;

    backend.emit(PlaybackEvent::Play);
    backend.emit(PlaybackEvent::TimeUpdate { seconds: 1.0 });
    backend.emit(PlaybackEvent::Pause);
    backend.emit(PlaybackEvent::Play);
    backend.emit(PlaybackEvent::TimeUpdate { seconds: 5.5 });
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(
        session.watch_caption().borrow().as_deref(),
        Some("General Kenobi")
    );
    assert!(store.saved.lock().is_empty(), "pause save still in flight");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(*store.saved.lock(), vec![1.0]);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn bridged_session_resumes_once_despite_duplicate_ready() {
    let store = store_with_progress("embed", 120.0, 20.0);
    let (transport, inbound, mut peer) = channel_bridge(16);
    let backend = Arc::new(RemoteBridgeBackend::attach(
        Arc::new(transport),
        inbound,
        &config().bridge,
    ));

    let session = PlaybackSession::start(
        remote_video("embed", 600.0),
        backend,
        deps(&store),
        &config(),
        "en",
    )
    .expect("session");

    for _ in 0..2 {
        peer.messages
            .send(BridgeMessage::Event(PlaybackEvent::Ready))
            .await
            .expect("bridge open");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut commands = Vec::new();
    while let Ok(command) = peer.commands.try_recv() {
        commands.push(command);
    }
    assert_eq!(
        commands,
        vec![
            BridgeCommand::SetCurrentTime { seconds: 120.0 },
            BridgeCommand::Play,
        ]
    );
    assert_eq!(session.resume_state(), ResumeState::Playing);
    session.shutdown().await;
}
