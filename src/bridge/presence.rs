//! Outbound status reporting ("rich presence"). Everything here is
//! fire-and-forget: a failing surface is logged and playback carries on.

use crate::api::locators::Locators;
use crate::api::models::VideoRecord;
use crate::error::AppResult;
use crate::events::{PlaybackState, PlayerEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const UNTITLED: &str = "Sans titre";
const UNKNOWN_ARTIST: &str = "Artiste inconnu";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub title: String,
    pub artist: String,
    pub playing: bool,
    /// Epoch millis at which the current playthrough started; only set while playing.
    pub start_timestamp: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceUpdate {
    NowPlaying(PresenceSnapshot),
    Clear,
}

/// Something outside the player that mirrors what is playing.
pub trait ControlSurface: Send + Sync {
    fn name(&self) -> &str;
    fn publish(&self, update: &PresenceUpdate) -> AppResult<()>;
}

/// Writes presence to the log.
pub struct LogPresence;

impl ControlSurface for LogPresence {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&self, update: &PresenceUpdate) -> AppResult<()> {
        match update {
            PresenceUpdate::NowPlaying(s) => log::info!(
                "[presence] {} {} - {} ({})",
                if s.playing { "▶" } else { "⏸" },
                s.title,
                s.artist,
                s.url
            ),
            PresenceUpdate::Clear => log::info!("[presence] cleared"),
        }
        Ok(())
    }
}

/// Keeps a JSON status file up to date for external status displays.
/// The file is removed when presence is cleared.
pub struct FilePresence {
    path: PathBuf,
}

impl FilePresence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlSurface for FilePresence {
    fn name(&self) -> &str {
        "file"
    }

    fn publish(&self, update: &PresenceUpdate) -> AppResult<()> {
        match update {
            PresenceUpdate::NowPlaying(snapshot) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let tmp = self.path.with_extension("json.tmp");
                std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
                std::fs::rename(&tmp, &self.path)?;
            }
            PresenceUpdate::Clear => match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

/// Turns engine events into presence updates.
pub struct PresenceTracker {
    locators: Locators,
    record: Option<VideoRecord>,
}

impl PresenceTracker {
    pub fn new(locators: Locators) -> Self {
        Self {
            locators,
            record: None,
        }
    }

    fn snapshot(&self, record: &VideoRecord, playing: bool, position: f64, duration: f64, now_ms: i64) -> PresenceSnapshot {
        let duration_seconds = if duration > 0.0 {
            Some(duration)
        } else {
            record.duration_seconds()
        };
        PresenceSnapshot {
            title: if record.title.is_empty() {
                UNTITLED.to_string()
            } else {
                record.title.clone()
            },
            artist: record
                .owner_name
                .clone()
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            playing,
            start_timestamp: playing.then(|| now_ms - (position.max(0.0) * 1000.0) as i64),
            duration_seconds,
            url: self.locators.share_link(&record.video_id),
        }
    }

    pub fn observe(&mut self, event: &PlayerEvent, now_ms: i64) -> Option<PresenceUpdate> {
        match event {
            PlayerEvent::TrackChanged { record, .. } => {
                self.record = Some(record.clone());
                Some(PresenceUpdate::NowPlaying(self.snapshot(record, true, 0.0, 0.0, now_ms)))
            }
            PlayerEvent::StateChanged {
                state,
                position,
                duration,
            } => {
                let record = self.record.as_ref()?;
                let playing = *state == PlaybackState::Playing;
                Some(PresenceUpdate::NowPlaying(self.snapshot(
                    record, playing, *position, *duration, now_ms,
                )))
            }
            PlayerEvent::PlaybackEnded => {
                self.record = None;
                Some(PresenceUpdate::Clear)
            }
            _ => None,
        }
    }
}

pub fn publish_all(surfaces: &[Box<dyn ControlSurface>], update: &PresenceUpdate) {
    for surface in surfaces {
        if let Err(e) = surface.publish(update) {
            log::warn!("[presence] {} failed: {}", surface.name(), e);
        }
    }
}

/// Forward engine events to every surface while `enabled` is set. Turning
/// presence off clears the surfaces once.
pub fn spawn_presence_forwarder(
    mut rx: broadcast::Receiver<PlayerEvent>,
    surfaces: Vec<Box<dyn ControlSurface>>,
    locators: Locators,
    enabled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tracker = PresenceTracker::new(locators);
        let mut was_enabled = enabled.load(Ordering::Relaxed);
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("[presence] Skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let update = tracker.observe(&event, chrono::Utc::now().timestamp_millis());
            let is_enabled = enabled.load(Ordering::Relaxed);
            if !is_enabled {
                if was_enabled {
                    publish_all(&surfaces, &PresenceUpdate::Clear);
                }
                was_enabled = false;
                continue;
            }
            was_enabled = true;
            if let Some(update) = update {
                publish_all(&surfaces, &update);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::RecordingSurface;
    use tempfile::TempDir;

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(Locators::new(&AppConfig::default()))
    }

    fn track_changed(id: &str) -> PlayerEvent {
        PlayerEvent::TrackChanged {
            record: VideoRecord::new(id, "Titre").with_owner("Saison 3"),
            index: Some(0),
        }
    }

    #[test]
    fn playing_snapshot_carries_start_time_and_share_link() {
        let mut tracker = tracker();
        tracker.observe(&track_changed("abc"), 0);
        let update = tracker.observe(
            &PlayerEvent::StateChanged {
                state: PlaybackState::Playing,
                position: 2.0,
                duration: 60.0,
            },
            10_000,
        );
        let Some(PresenceUpdate::NowPlaying(s)) = update else {
            panic!("expected a snapshot");
        };
        assert_eq!(s.artist, "Saison 3");
        assert_eq!(s.start_timestamp, Some(8_000));
        assert_eq!(s.duration_seconds, Some(60.0));
        assert_eq!(s.url, "https://v2.protogen.fr/video/abc");
    }

    #[test]
    fn paused_snapshot_has_no_start_time() {
        let mut tracker = tracker();
        tracker.observe(&track_changed("abc"), 0);
        let update = tracker.observe(
            &PlayerEvent::StateChanged {
                state: PlaybackState::Paused,
                position: 2.0,
                duration: 0.0,
            },
            10_000,
        );
        let Some(PresenceUpdate::NowPlaying(s)) = update else {
            panic!("expected a snapshot");
        };
        assert!(!s.playing);
        assert_eq!(s.start_timestamp, None);
    }

    #[test]
    fn end_clears_and_state_without_track_is_silent() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.observe(
                &PlayerEvent::StateChanged {
                    state: PlaybackState::Playing,
                    position: 0.0,
                    duration: 0.0
                },
                0
            ),
            None
        );
        tracker.observe(&track_changed("abc"), 0);
        assert_eq!(
            tracker.observe(&PlayerEvent::PlaybackEnded, 0),
            Some(PresenceUpdate::Clear)
        );
    }

    #[test]
    fn file_presence_writes_and_removes_status() {
        let dir = TempDir::new().unwrap();
        let surface = FilePresence::new(dir.path().join("presence.json"));
        let mut tracker = tracker();
        let update = tracker.observe(&track_changed("abc"), 5).unwrap();

        surface.publish(&update).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(surface.path()).unwrap()).unwrap();
        assert_eq!(written["title"], "Titre");
        assert_eq!(written["playing"], true);

        surface.publish(&PresenceUpdate::Clear).unwrap();
        assert!(!surface.path().exists());
        surface.publish(&PresenceUpdate::Clear).unwrap();
    }

    struct BrokenSurface;

    impl ControlSurface for BrokenSurface {
        fn name(&self) -> &str {
            "broken"
        }

        fn publish(&self, _update: &PresenceUpdate) -> AppResult<()> {
            Err(crate::error::AppError::Io(std::io::Error::other("status display gone")))
        }
    }

    #[tokio::test]
    async fn failing_surface_does_not_starve_the_others() {
        let (tx, rx) = broadcast::channel(16);
        let surface = RecordingSurface::default();
        let handle = spawn_presence_forwarder(
            rx,
            vec![Box::new(BrokenSurface), Box::new(surface.clone())],
            Locators::new(&AppConfig::default()),
            Arc::new(AtomicBool::new(true)),
        );
        tx.send(track_changed("a")).unwrap();
        tx.send(PlayerEvent::StateChanged {
            state: PlaybackState::Paused,
            position: 4.0,
            duration: 60.0,
        })
        .unwrap();
        tx.send(PlayerEvent::PlaybackEnded).unwrap();
        drop(tx);
        handle.await.unwrap();

        let updates = surface.updates();
        assert_eq!(updates.len(), 3);
        assert!(matches!(&updates[1], PresenceUpdate::NowPlaying(s) if !s.playing));
        assert_eq!(updates[2], PresenceUpdate::Clear);
    }

    async fn run_forwarder(enabled: bool, events: Vec<PlayerEvent>) -> Vec<PresenceUpdate> {
        let (tx, rx) = broadcast::channel(16);
        let surface = RecordingSurface::default();
        let handle = spawn_presence_forwarder(
            rx,
            vec![Box::new(surface.clone())],
            Locators::new(&AppConfig::default()),
            Arc::new(AtomicBool::new(enabled)),
        );
        for event in events {
            tx.send(event).unwrap();
        }
        drop(tx);
        handle.await.unwrap();
        surface.updates()
    }

    #[tokio::test]
    async fn forwarder_respects_opt_out() {
        let events = vec![track_changed("a"), PlayerEvent::PlaybackEnded];
        assert!(run_forwarder(false, events.clone()).await.is_empty());

        let updates = run_forwarder(true, events).await;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1], PresenceUpdate::Clear);
    }
}
