//! Two-way relay between the engine and surfaces outside it: media keys and
//! other remote command sources, the companion window, and presence.

pub mod companion;
pub mod presence;
pub mod remote;

use crate::audio::element::MediaElement;
use crate::audio::engine::SharedEngine;
use crate::error::AppResult;
use crate::events::ControlOwner;
use companion::{CompanionSignal, CompanionSurface};
use remote::RemoteCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct ExternalControlBridge<E: MediaElement> {
    engine: SharedEngine<E>,
}

impl<E: MediaElement> Clone for ExternalControlBridge<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: MediaElement> ExternalControlBridge<E> {
    pub fn new(engine: SharedEngine<E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> SharedEngine<E> {
        self.engine.clone()
    }

    /// Apply one inbound command. Transport commands go to whichever surface
    /// owns playback; next/previous always go through the engine's queue.
    pub async fn dispatch(&self, command: RemoteCommand) {
        log::debug!("[bridge] Remote command: {:?}", command);
        let mut engine = self.engine.lock().await;

        if command.is_transport() && engine.owner() == ControlOwner::Companion {
            engine.relay_to_companion(&command);
            if let RemoteCommand::SeekTo(seconds) = command {
                engine.note_companion_position(seconds);
            }
            return;
        }

        match command {
            RemoteCommand::Play => {
                engine.resume().await;
            }
            RemoteCommand::Pause => engine.pause(),
            RemoteCommand::Toggle => engine.toggle_play().await,
            RemoteCommand::Next => engine.next().await,
            RemoteCommand::Previous => engine.previous().await,
            RemoteCommand::SeekTo(seconds) => engine.seek(seconds),
        }
    }

    /// Parse and apply a text command; unknown words are ignored.
    pub async fn dispatch_text(&self, input: &str) -> bool {
        match RemoteCommand::parse(input) {
            Some(command) => {
                self.dispatch(command).await;
                true
            }
            None => false,
        }
    }

    /// Hand the current record to `companion`.
    pub async fn detach(&self, companion: Box<dyn CompanionSurface>) -> AppResult<()> {
        self.engine.lock().await.hand_off(companion)
    }

    /// Bring playback back from the companion and keep playing locally.
    pub async fn expand(&self) {
        let mut engine = self.engine.lock().await;
        let elapsed = engine.position();
        engine.reclaim(elapsed, true).await;
    }

    pub async fn handle_companion_signal(&self, signal: CompanionSignal) {
        let mut engine = self.engine.lock().await;
        match signal {
            CompanionSignal::Expand { elapsed } => engine.reclaim(elapsed, true).await,
            CompanionSignal::Closed { elapsed } => engine.reclaim(elapsed, false).await,
            CompanionSignal::Ended => {
                if engine.owner() == ControlOwner::Companion {
                    engine.on_playback_ended().await;
                }
            }
            CompanionSignal::Progress { elapsed } => engine.note_companion_position(elapsed),
        }
    }

    pub fn spawn_remote_listener(
        &self,
        mut commands: mpsc::UnboundedReceiver<RemoteCommand>,
    ) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                bridge.dispatch(command).await;
            }
            log::debug!("[bridge] Remote command source closed");
        })
    }

    pub fn spawn_companion_listener(
        &self,
        mut signals: mpsc::UnboundedReceiver<CompanionSignal>,
    ) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                bridge.handle_companion_signal(signal).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::locators::Locators;
    use crate::api::models::VideoRecord;
    use crate::audio::engine::{EngineOptions, PlaybackEngine};
    use crate::config::AppConfig;
    use crate::events::{EventBus, PlaybackState};
    use crate::store::PreferenceStore;
    use crate::testing::{CompanionCall, FakeCompanion, FakeElement, RecordingViews};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn bridge(dir: &TempDir) -> ExternalControlBridge<FakeElement> {
        let engine = PlaybackEngine::new(
            FakeElement::default(),
            Locators::new(&AppConfig::default()),
            Arc::new(RecordingViews::default()),
            PreferenceStore::new(dir.path()),
            EventBus::default(),
            EngineOptions::default(),
        );
        ExternalControlBridge::new(engine.into_shared())
    }

    #[tokio::test]
    async fn text_commands_drive_the_engine() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge(&dir);
        bridge
            .engine
            .lock()
            .await
            .set_queue(vec![VideoRecord::new("a", "A"), VideoRecord::new("b", "B")], true)
            .await;

        assert!(bridge.dispatch_text("pause").await);
        assert_eq!(bridge.engine.lock().await.state(), PlaybackState::Paused);
        assert!(bridge.dispatch_text("next").await);
        assert_eq!(bridge.engine.lock().await.current().unwrap().video_id, "b");
        assert!(!bridge.dispatch_text("eject").await);
    }

    #[tokio::test]
    async fn transport_is_relayed_while_companion_owns_playback() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge(&dir);
        bridge
            .engine
            .lock()
            .await
            .add_and_play(VideoRecord::new("a", "A"))
            .await;

        let companion = FakeCompanion::default();
        bridge.detach(Box::new(companion.clone())).await.unwrap();
        bridge.dispatch(RemoteCommand::Pause).await;
        bridge.dispatch(RemoteCommand::SeekTo(12.0)).await;

        let calls = companion.calls();
        assert!(matches!(calls[0], CompanionCall::Open(_)));
        assert_eq!(calls[1], CompanionCall::Command(RemoteCommand::Pause));
        assert_eq!(calls[2], CompanionCall::Command(RemoteCommand::SeekTo(12.0)));
        assert_eq!(bridge.engine.lock().await.position(), 12.0);
        assert!(!bridge.engine.lock().await.element().playing);
    }
}
