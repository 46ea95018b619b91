//! Typed notifications published by the playback engine. Collaborators
//! (presence, history, the shell) subscribe instead of reaching into the
//! engine's fields.

use crate::api::models::VideoRecord;
use crate::audio::queue::RepeatMode;
use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub position: f64,
    pub duration: f64,
    pub position_fraction: f64,
}

impl ProgressPayload {
    pub fn new(position: f64, duration: f64) -> Self {
        let position_fraction = if duration > 0.0 {
            (position / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            position,
            duration,
            position_fraction,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Who currently owns the single playback handle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlOwner {
    Local,
    Companion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlayerEvent {
    /// Published after the engine's current record has been updated.
    TrackChanged {
        record: VideoRecord,
        index: Option<usize>,
    },
    StateChanged {
        state: PlaybackState,
        position: f64,
        duration: f64,
    },
    Progress(ProgressPayload),
    QueueChanged {
        len: usize,
        current_index: Option<usize>,
    },
    /// Playback stopped with nothing left to play, or was stopped explicitly.
    PlaybackEnded,
    VolumeChanged {
        volume: f32,
        muted: bool,
    },
    ModesChanged {
        shuffle: bool,
        repeat: RepeatMode,
    },
    FavoriteToggled {
        video_id: String,
        favorite: bool,
    },
    ControlOwnerChanged {
        owner: ControlOwner,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Publish to whoever is listening. Nobody listening is fine.
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(PlayerEvent::PlaybackEnded);
        bus.emit(PlayerEvent::StateChanged {
            state: PlaybackState::Paused,
            position: 1.0,
            duration: 2.0,
        });

        assert!(matches!(rx.recv().await.unwrap(), PlayerEvent::PlaybackEnded));
        assert!(matches!(
            rx.recv().await.unwrap(),
            PlayerEvent::StateChanged {
                state: PlaybackState::Paused,
                ..
            }
        ));
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.emit(PlayerEvent::PlaybackEnded);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn progress_fraction_handles_unknown_duration() {
        assert_eq!(ProgressPayload::new(5.0, 0.0).position_fraction, 0.0);
        assert_eq!(ProgressPayload::new(5.0, 10.0).position_fraction, 0.5);
    }
}
