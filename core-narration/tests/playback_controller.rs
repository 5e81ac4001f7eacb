//! Tests for the shared playback controller.

mod common;

use bridge_traits::PcmBuffer;
use common::FakeAudioBackend;
use core_narration::{HaltObserver, NarrationError, PlaybackController, PlaybackEnd, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn clip() -> PcmBuffer {
    PcmBuffer::new(24_000, vec![vec![0.0, 0.25, 0.5, 0.25]])
}

#[tokio::test]
async fn context_is_created_lazily_and_reused() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());
    assert_eq!(audio.contexts_created(), 0);

    controller.play("a", clip()).await.unwrap();
    controller.play("a", clip()).await.unwrap();

    assert_eq!(audio.contexts_created(), 1);
    assert_eq!(audio.sources_started(), 2);
}

#[tokio::test]
async fn suspended_context_is_resumed_before_start() {
    let audio = FakeAudioBackend::suspended();
    let controller = PlaybackController::new(audio.clone());

    controller.play("a", clip()).await.unwrap();
    let context = audio.context().unwrap();
    assert_eq!(context.resumes(), 1);

    controller.play("a", clip()).await.unwrap();
    assert_eq!(context.resumes(), 1, "running context needs no resume");

    context.suspend();
    controller.play("a", clip()).await.unwrap();
    assert_eq!(context.resumes(), 2);
}

#[tokio::test]
async fn natural_end_resolves_finished() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let handle = controller.play("a", clip()).await.unwrap();
    assert_eq!(controller.active_owner().as_deref(), Some("a"));
    assert_eq!(controller.active_session(), Some(handle.id()));

    assert!(audio.finish_latest());
    assert_eq!(handle.finished().await, PlaybackEnd::Finished);
    assert_eq!(controller.active_session(), None);
}

#[tokio::test]
async fn new_session_supersedes_and_detaches_old_callback() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let first = controller.play("a", clip()).await.unwrap();
    let second = controller.play("b", clip()).await.unwrap();
    assert_eq!(second.superseded(), Some("a"));
    assert!(second.id() > first.id());

    let sources = audio.context().unwrap().sources();
    assert!(sources[0].is_stopped());
    assert!(!sources[0].has_callback(), "callback detached before stop");
    assert!(!sources[1].is_stopped());

    assert_eq!(first.finished().await, PlaybackEnd::Superseded);
    assert_eq!(controller.active_owner().as_deref(), Some("b"));
}

fn recorder() -> (Arc<Mutex<Vec<(SessionId, PlaybackEnd)>>>, HaltObserver) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer: HaltObserver = {
        let seen = seen.clone();
        Box::new(move |id, end| seen.lock().push((id, end)))
    };
    (seen, observer)
}

#[tokio::test]
async fn halt_observer_runs_before_the_superseding_play_returns() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());
    let (seen, observer) = recorder();

    let first = controller.play_observed("a", clip(), observer).await.unwrap();
    let first_id = first.id();
    controller.play("b", clip()).await.unwrap();

    assert_eq!(*seen.lock(), vec![(first_id, PlaybackEnd::Superseded)]);
}

#[tokio::test]
async fn halt_observer_sees_stop_but_not_natural_end() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let (finished_seen, observer) = recorder();
    let handle = controller.play_observed("a", clip(), observer).await.unwrap();
    assert!(audio.finish_latest());
    assert_eq!(handle.finished().await, PlaybackEnd::Finished);
    assert!(finished_seen.lock().is_empty());

    let (stopped_seen, observer) = recorder();
    let handle = controller.play_observed("a", clip(), observer).await.unwrap();
    let id = handle.id();
    controller.teardown().await;
    assert_eq!(*stopped_seen.lock(), vec![(id, PlaybackEnd::Stopped)]);
}

#[tokio::test]
async fn try_end_reports_a_halted_session_without_waiting() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let mut handle = controller.play("a", clip()).await.unwrap();
    assert_eq!(handle.try_end(), None);

    controller.supersede();
    assert_eq!(handle.try_end(), Some(PlaybackEnd::Superseded));
}

#[tokio::test]
async fn stop_returns_owner_and_is_idempotent() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let handle = controller.play("a", clip()).await.unwrap();
    assert_eq!(controller.stop().as_deref(), Some("a"));
    assert_eq!(controller.stop(), None);

    assert!(!audio.finish_latest(), "stopped source cannot finish");
    assert_eq!(handle.finished().await, PlaybackEnd::Stopped);
}

#[tokio::test]
async fn stop_session_ignores_stale_ids() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let first = controller.play("a", clip()).await.unwrap();
    let stale = first.id();
    let second = controller.play("a", clip()).await.unwrap();

    assert!(!controller.stop_session(stale));
    assert_eq!(controller.active_session(), Some(second.id()));
    assert!(controller.stop_session(second.id()));
    assert_eq!(controller.active_session(), None);
}

#[tokio::test]
async fn late_end_of_replaced_session_is_ignored() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    controller.play("a", clip()).await.unwrap();
    let second = controller.play("b", clip()).await.unwrap();

    // Even if a backend fired the old callback, it must not end the new session.
    let sources = audio.context().unwrap().sources();
    assert!(!sources[0].finish());
    assert_eq!(controller.active_session(), Some(second.id()));
}

#[tokio::test]
async fn teardown_blocks_play_until_init() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());

    let handle = controller.play("a", clip()).await.unwrap();
    controller.teardown().await;
    assert_eq!(handle.finished().await, PlaybackEnd::Stopped);
    assert!(!controller.is_initialized());

    let err = controller.play("a", clip()).await.unwrap_err();
    assert!(matches!(err, NarrationError::TornDown));

    controller.init();
    controller.play("a", clip()).await.unwrap();
    assert_eq!(audio.contexts_created(), 2, "closed context is replaced");
}

#[tokio::test]
async fn context_creation_failure_is_a_playback_error() {
    let audio = FakeAudioBackend::new();
    audio.fail_next_create();
    let controller = PlaybackController::new(audio.clone());

    let err = controller.play("a", clip()).await.unwrap_err();
    assert!(matches!(err, NarrationError::Playback(_)));

    controller.play("a", clip()).await.unwrap();
    assert_eq!(audio.contexts_created(), 1);
}

#[tokio::test]
async fn completion_resolves_once_when_controller_dropped() {
    let audio = FakeAudioBackend::new();
    let controller = PlaybackController::new(audio.clone());
    let handle = controller.play("a", clip()).await.unwrap();
    drop(controller);

    let end = tokio::time::timeout(Duration::from_secs(1), handle.finished())
        .await
        .unwrap();
    assert_eq!(end, PlaybackEnd::Stopped);
}
