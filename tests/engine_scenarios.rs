use protoplayer::api::locators::Locators;
use protoplayer::api::models::VideoRecord;
use protoplayer::audio::element::SourceKind;
use protoplayer::audio::engine::{EngineOptions, PlaybackEngine};
use protoplayer::audio::queue::RepeatMode;
use protoplayer::config::AppConfig;
use protoplayer::events::{EventBus, PlaybackState, PlayerEvent};
use protoplayer::store::PreferenceStore;
use protoplayer::testing::{FakeElement, RecordingViews};
use std::sync::Arc;
use tempfile::TempDir;

fn rec(id: &str) -> VideoRecord {
    VideoRecord::new(id, format!("Video {}", id))
}

fn engine(dir: &TempDir) -> PlaybackEngine<FakeElement> {
    PlaybackEngine::new(
        FakeElement::default(),
        Locators::new(&AppConfig::default()),
        Arc::new(RecordingViews::default()),
        PreferenceStore::new(dir.path()),
        EventBus::default(),
        EngineOptions::default(),
    )
}

fn ids(engine: &PlaybackEngine<FakeElement>) -> Vec<String> {
    engine
        .queue()
        .records()
        .iter()
        .map(|r| r.video_id.clone())
        .collect()
}

#[tokio::test]
async fn add_and_play_never_duplicates() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);

    engine.add_and_play(rec("a")).await;
    engine.add_and_play(rec("b")).await;
    engine.add_and_play(rec("a")).await;

    assert_eq!(ids(&engine), vec!["a", "b"]);
    assert_eq!(engine.queue().current_index(), Some(0));
    assert_eq!(engine.current().unwrap().video_id, "a");
}

#[tokio::test]
async fn next_on_single_item_queue_stays_put() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.add_and_play(rec("only")).await;

    engine.next().await;
    assert_eq!(engine.current().unwrap().video_id, "only");

    engine.toggle_shuffle();
    engine.next().await;
    assert_eq!(engine.current().unwrap().video_id, "only");
    assert_eq!(engine.queue().current_index(), Some(0));
}

#[tokio::test]
async fn next_wraps_to_the_start() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b")], true).await;

    engine.next().await;
    engine.next().await;
    assert_eq!(engine.current().unwrap().video_id, "a");
}

#[tokio::test]
async fn empty_queue_navigation_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.next().await;
    engine.previous().await;
    assert!(engine.current().is_none());
    assert!(engine.element().attaches.is_empty());
}

#[tokio::test]
async fn repeat_one_restarts_the_same_record() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b")], true).await;
    engine.cycle_repeat_mode();
    assert_eq!(engine.cycle_repeat_mode(), RepeatMode::One);

    engine.element_mut().position = 42.0;
    engine.on_playback_ended().await;

    assert_eq!(engine.current().unwrap().video_id, "a");
    assert_eq!(engine.queue().current_index(), Some(0));
    assert_eq!(engine.position(), 0.0);
    assert_eq!(engine.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn repeat_one_after_stream_finished_reattaches() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a")], true).await;
    engine.cycle_repeat_mode();
    engine.cycle_repeat_mode();

    engine.element_mut().finished = true;
    engine.tick().await;

    assert_eq!(engine.element().attaches.len(), 2);
    assert_eq!(engine.current().unwrap().video_id, "a");
}

#[tokio::test]
async fn repeat_all_wraps_from_the_last_record() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b")], false).await;
    engine.play_index(1).await;
    assert_eq!(engine.cycle_repeat_mode(), RepeatMode::All);

    engine.on_playback_ended().await;

    assert_eq!(engine.current().unwrap().video_id, "a");
    assert_eq!(engine.queue().current_index(), Some(0));
}

#[tokio::test]
async fn ended_advances_through_the_queue() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b"), rec("c")], true).await;

    engine.on_playback_ended().await;
    assert_eq!(engine.current().unwrap().video_id, "b");
    engine.on_playback_ended().await;
    assert_eq!(engine.current().unwrap().video_id, "c");
    engine.on_playback_ended().await;
    assert_eq!(engine.state(), PlaybackState::Stopped);
}

#[tokio::test]
async fn removing_before_current_keeps_it_current() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b"), rec("c")], false).await;
    engine.play_index(2).await;

    engine.remove_at(0);
    assert_eq!(engine.queue().current_index(), Some(1));
    assert_eq!(engine.queue().current().unwrap().video_id, "c");

    engine.remove_at(1);
    assert_eq!(engine.queue().current_index(), Some(0));
    assert_eq!(engine.queue().current().unwrap().video_id, "b");
}

#[tokio::test]
async fn queue_next_relocates_existing_entry() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b"), rec("c"), rec("d")], true).await;

    assert!(engine.add_to_queue_next(rec("d")));
    assert_eq!(ids(&engine), vec!["a", "d", "b", "c"]);
    assert!(!engine.add_to_queue(rec("b")));
    assert_eq!(engine.queue().len(), 4);
}

#[tokio::test]
async fn every_play_gets_its_own_single_fallback() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.element_mut().fail_adaptive = Some(true);

    engine.add_and_play(rec("a")).await;
    engine.add_and_play(rec("b")).await;

    let kinds: Vec<SourceKind> = engine.element().attaches.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SourceKind::Adaptive,
            SourceKind::Direct,
            SourceKind::Adaptive,
            SourceKind::Direct
        ]
    );
}

#[tokio::test]
async fn track_change_is_visible_before_stream_attaches() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.element_mut().fail_adaptive = Some(true);
    engine.element_mut().fail_direct = true;
    let mut rx = engine.events().subscribe();

    engine.add_and_play(rec("a")).await;

    let mut order = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            PlayerEvent::TrackChanged { .. } => order.push("track"),
            PlayerEvent::StateChanged { state, .. } => {
                assert_eq!(state, PlaybackState::Stopped);
                order.push("state");
            }
            _ => {}
        }
    }
    assert_eq!(order, vec!["track", "state"]);
}

#[tokio::test]
async fn removing_the_playing_record_plays_the_one_that_slides_in() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b"), rec("c")], false).await;
    engine.play_index(1).await;

    engine.remove_at(1);
    assert_eq!(engine.current().unwrap().video_id, "b");
    engine.on_playback_ended().await;

    assert_eq!(engine.current().unwrap().video_id, "c");
    assert_eq!(engine.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn next_after_removing_the_playing_record_lands_on_its_slot() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    engine.set_queue(vec![rec("a"), rec("b"), rec("c")], false).await;
    engine.play_index(1).await;

    engine.remove_at(1);
    engine.next().await;
    assert_eq!(engine.current().unwrap().video_id, "c");
    engine.next().await;
    assert_eq!(engine.current().unwrap().video_id, "a");
}

#[tokio::test]
async fn a_new_play_tears_down_the_previous_stream() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);

    engine.add_and_play(rec("a")).await;
    engine.add_and_play(rec("b")).await;

    let element = engine.element();
    assert_eq!(element.detach_count, 1);
    assert_eq!(element.attaches.len(), 2);
    let attached = element.attached.as_ref().unwrap();
    assert!(attached.url.ends_with("/b/master.m3u8"), "{}", attached.url);
}
