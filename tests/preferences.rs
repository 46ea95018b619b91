use protoplayer::api::models::VideoRecord;
use protoplayer::events::{EventBus, PlayerEvent};
use protoplayer::store::history::spawn_history_recorder;
use protoplayer::store::{Favorites, History, PreferenceStore, Settings, KEY_FAVORITES, KEY_SETTINGS};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

#[test]
fn favorites_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::new(dir.path());
    let record = VideoRecord::new("abc", "Un titre").with_owner("Saison 4");

    let mut favorites = Favorites::load(&store);
    assert!(favorites.toggle_and_persist(&record, &store));

    let reloaded = Favorites::load(&store);
    assert_eq!(reloaded.get("abc"), Some(&record));

    let mut favorites = reloaded;
    assert!(!favorites.toggle_and_persist(&record, &store));
    assert!(Favorites::load(&store).is_empty());
}

#[test]
fn legacy_id_only_favorites_load_empty() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::new(dir.path());
    store.set(KEY_FAVORITES, &vec!["abc", "def"]).unwrap();
    assert!(Favorites::load(&store).is_empty());
}

#[test]
fn partial_settings_merge_over_defaults() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::new(dir.path());
    store
        .set(
            KEY_SETTINGS,
            &serde_json::json!({ "theme": "light", "skipSeason8Intro": true, "futureFlag": 3 }),
        )
        .unwrap();

    let settings = Settings::load(&store);
    assert_eq!(settings.theme, "light");
    assert!(settings.skip_season8_intro);
    assert_eq!(settings.max_queue_size, 50);

    settings.save(&store);
    let raw = store.get_value(KEY_SETTINGS).unwrap();
    assert_eq!(raw["futureFlag"], 3);
    assert_eq!(raw["accentColor"], "#FF0000");
}

#[test]
fn corrupt_values_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("volume.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("history.json"), "42").unwrap();
    let store = PreferenceStore::new(dir.path());

    assert_eq!(store.volume(), protoplayer::store::DEFAULT_VOLUME);
    assert!(History::load(&store).is_empty());
}

#[tokio::test]
async fn recorder_deduplicates_history_from_track_events() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::new(dir.path());
    let bus = EventBus::default();
    let history = Arc::new(Mutex::new(History::load(&store)));
    let recorder = spawn_history_recorder(bus.subscribe(), Arc::clone(&history), store.clone());

    for id in ["abc", "xyz", "abc"] {
        bus.emit(PlayerEvent::TrackChanged {
            record: VideoRecord::new(id, id),
            index: None,
        });
    }
    drop(bus);
    recorder.await.unwrap();

    let ids: Vec<String> = History::load(&store)
        .entries()
        .iter()
        .map(|e| e.record.video_id.clone())
        .collect();
    assert_eq!(ids, vec!["abc", "xyz"]);
    assert_eq!(history.lock().await.len(), 2);
}
