//! Scripted stand-ins for the media element, view tracking and the
//! companion window, used by unit and integration tests.

use crate::audio::element::{MediaElement, MediaSource};
use crate::audio::engine::ViewTracker;
use crate::bridge::companion::{CompanionPayload, CompanionSurface};
use crate::bridge::presence::{ControlSurface, PresenceUpdate};
use crate::bridge::remote::RemoteCommand;
use crate::error::{AppError, AppResult, AttachError};
use std::sync::{Arc, Mutex};

/// Records every attach and lets tests steer position and failures.
#[derive(Debug, Default)]
pub struct FakeElement {
    pub attaches: Vec<MediaSource>,
    /// `Some(fatal)` makes adaptive attaches fail.
    pub fail_adaptive: Option<bool>,
    pub fail_direct: bool,
    pub attached: Option<MediaSource>,
    pub detach_count: usize,
    pub playing: bool,
    pub finished: bool,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub bass_boost: f32,
}

impl MediaElement for FakeElement {
    async fn attach(&mut self, source: &MediaSource) -> Result<(), AttachError> {
        self.detach();
        self.attaches.push(source.clone());

        use crate::audio::element::SourceKind;
        match (source.kind, self.fail_adaptive) {
            (SourceKind::Adaptive, Some(true)) => {
                return Err(AttachError::fatal("manifest failed to load"))
            }
            (SourceKind::Adaptive, Some(false)) => {
                self.attached = Some(source.clone());
                self.playing = true;
                return Err(AttachError::recoverable("segment stalled"));
            }
            (SourceKind::Direct, _) if self.fail_direct => {
                return Err(AttachError::fatal("direct media unavailable"))
            }
            _ => {}
        }

        self.attached = Some(source.clone());
        self.position = source.start_at;
        self.finished = false;
        self.playing = true;
        Ok(())
    }

    fn detach(&mut self) {
        if self.attached.take().is_some() {
            self.detach_count += 1;
        }
        self.playing = false;
        self.position = 0.0;
    }

    fn play(&mut self) {
        if self.attached.is_some() {
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, position_seconds: f64) {
        self.position = position_seconds;
        self.finished = false;
    }

    fn position_seconds(&self) -> f64 {
        self.position
    }

    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_bass_boost(&mut self, db: f32) {
        self.bass_boost = db;
    }
}

#[derive(Debug, Default)]
pub struct RecordingViews {
    seen: Mutex<Vec<String>>,
}

impl RecordingViews {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl ViewTracker for RecordingViews {
    fn view_started(&self, video_id: &str) {
        self.seen.lock().unwrap().push(video_id.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompanionCall {
    Open(CompanionPayload),
    Update(CompanionPayload),
    Command(RemoteCommand),
    Close,
}

/// Companion window that only records what it was asked to do. Clones
/// share the same log.
#[derive(Debug, Clone, Default)]
pub struct FakeCompanion {
    pub calls: Arc<Mutex<Vec<CompanionCall>>>,
    pub fail_open: bool,
}

impl FakeCompanion {
    pub fn calls(&self) -> Vec<CompanionCall> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: CompanionCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CompanionSurface for FakeCompanion {
    fn open(&mut self, payload: &CompanionPayload) -> AppResult<()> {
        if self.fail_open {
            return Err(AppError::Companion("window refused to open".into()));
        }
        self.push(CompanionCall::Open(payload.clone()));
        Ok(())
    }

    fn update(&mut self, payload: &CompanionPayload) -> AppResult<()> {
        self.push(CompanionCall::Update(payload.clone()));
        Ok(())
    }

    fn command(&mut self, command: &RemoteCommand) -> AppResult<()> {
        self.push(CompanionCall::Command(command.clone()));
        Ok(())
    }

    fn close(&mut self) {
        self.push(CompanionCall::Close);
    }
}

/// Presence surface that keeps every update it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub updates: Arc<Mutex<Vec<PresenceUpdate>>>,
}

impl RecordingSurface {
    pub fn updates(&self) -> Vec<PresenceUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ControlSurface for RecordingSurface {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish(&self, update: &PresenceUpdate) -> AppResult<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}
