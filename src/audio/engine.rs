//! The playback engine: sole owner of the queue and playback state, and
//! the only component allowed to start or stop a stream.

use crate::api::client::CatalogClient;
use crate::api::locators::Locators;
use crate::api::models::VideoRecord;
use crate::audio::dsp::clamp_bass_boost;
use crate::audio::element::{MediaElement, MediaSource};
use crate::audio::queue::{PersistedQueueState, PlaybackQueue, RepeatMode};
use crate::bridge::companion::{CompanionPayload, CompanionSurface};
use crate::bridge::remote::RemoteCommand;
use crate::error::{AppError, AppResult};
use crate::events::{ControlOwner, EventBus, PlaybackState, PlayerEvent, ProgressPayload};
use crate::store::{PreferenceStore, KEY_BASS_BOOST, KEY_MUTED, KEY_VOLUME};
use serde::Serialize;
use std::sync::Arc;

/// Below this many seconds `previous` changes track; above it, it restarts.
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;
pub const SEEK_STEP_SECS: f64 = 5.0;
pub const INTRO_SKIP_SECS: f64 = 8.0;
const INTRO_SKIP_OWNER: &str = "Saison 8";

pub type SharedEngine<E> = Arc<tokio::sync::Mutex<PlaybackEngine<E>>>;

/// Best-effort "a view started" reporting. Implementations must not block
/// and must swallow their own failures.
pub trait ViewTracker: Send + Sync {
    fn view_started(&self, video_id: &str);
}

/// Reports views to the catalog on a detached task.
pub struct CatalogViews(pub Arc<CatalogClient>);

impl ViewTracker for CatalogViews {
    fn view_started(&self, video_id: &str) {
        let client = Arc::clone(&self.0);
        let video_id = video_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = client.track_view(&video_id).await {
                log::warn!("[engine] Failed to track view for {}: {}", video_id, e);
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeIcon {
    Muted,
    Audible,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// False models an environment without adaptive streaming support.
    pub adaptive_streaming: bool,
    pub skip_season8_intro: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            adaptive_streaming: true,
            skip_season8_intro: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub current: Option<VideoRecord>,
    pub state: PlaybackState,
    pub position: f64,
    pub duration: f64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    pub muted: bool,
    pub bass_boost: f32,
    pub owner: ControlOwner,
    pub queue_len: usize,
    pub current_index: Option<usize>,
}

pub struct PlaybackEngine<E: MediaElement> {
    element: E,
    queue: PlaybackQueue,
    current: Option<VideoRecord>,
    state: PlaybackState,
    /// A stream for `current` is attached to the local element.
    attached: bool,
    /// Where local playback should pick up when nothing is attached yet.
    resume_at: f64,
    volume: f32,
    muted: bool,
    bass_boost: f32,
    owner: ControlOwner,
    companion: Option<Box<dyn CompanionSurface>>,
    companion_elapsed: f64,
    locators: Locators,
    views: Arc<dyn ViewTracker>,
    store: PreferenceStore,
    events: EventBus,
    options: EngineOptions,
}

impl<E: MediaElement> PlaybackEngine<E> {
    /// Build an engine, restoring volume, mute and bass boost from the store.
    pub fn new(
        mut element: E,
        locators: Locators,
        views: Arc<dyn ViewTracker>,
        store: PreferenceStore,
        events: EventBus,
        options: EngineOptions,
    ) -> Self {
        let volume = store.volume();
        let muted = store.muted();
        let bass_boost = store.bass_boost();
        element.set_volume(volume);
        element.set_muted(muted);
        element.set_bass_boost(bass_boost);

        Self {
            element,
            queue: PlaybackQueue::new(),
            current: None,
            state: PlaybackState::Stopped,
            attached: false,
            resume_at: 0.0,
            volume,
            muted,
            bass_boost,
            owner: ControlOwner::Local,
            companion: None,
            companion_elapsed: 0.0,
            locators,
            views,
            store,
            events,
            options,
        }
    }

    pub fn into_shared(self) -> SharedEngine<E> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn current(&self) -> Option<&VideoRecord> {
        self.current.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn owner(&self) -> ControlOwner {
        self.owner
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn set_skip_season8_intro(&mut self, enabled: bool) {
        self.options.skip_season8_intro = enabled;
    }

    pub fn position(&self) -> f64 {
        match self.owner {
            ControlOwner::Companion => self.companion_elapsed,
            ControlOwner::Local if self.attached => self.element.position_seconds(),
            ControlOwner::Local => self.resume_at,
        }
    }

    pub fn duration(&self) -> f64 {
        let from_element = if self.attached {
            self.element.duration_seconds()
        } else {
            0.0
        };
        if from_element > 0.0 {
            from_element
        } else {
            self.current
                .as_ref()
                .and_then(VideoRecord::duration_seconds)
                .unwrap_or(0.0)
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn bass_boost(&self) -> f32 {
        self.bass_boost
    }

    pub fn volume_icon(&self) -> VolumeIcon {
        if self.muted || self.volume == 0.0 {
            VolumeIcon::Muted
        } else {
            VolumeIcon::Audible
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            current: self.current.clone(),
            state: self.state,
            position: self.position(),
            duration: self.duration(),
            shuffle: self.queue.is_shuffled(),
            repeat: self.queue.repeat_mode(),
            volume: self.volume,
            muted: self.muted,
            bass_boost: self.bass_boost,
            owner: self.owner,
            queue_len: self.queue.len(),
            current_index: self.queue.current_index(),
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.events.emit(PlayerEvent::StateChanged {
            state,
            position: self.position(),
            duration: self.duration(),
        });
    }

    fn emit_queue_changed(&self) {
        self.events.emit(PlayerEvent::QueueChanged {
            len: self.queue.len(),
            current_index: self.queue.current_index(),
        });
    }

    fn emit_progress(&self) {
        self.events
            .emit(PlayerEvent::Progress(ProgressPayload::new(self.position(), self.duration())));
    }

    fn emit_modes(&self) {
        self.events.emit(PlayerEvent::ModesChanged {
            shuffle: self.queue.is_shuffled(),
            repeat: self.queue.repeat_mode(),
        });
    }

    fn intro_offset(&self, record: &VideoRecord) -> f64 {
        let is_season8 = record
            .owner_name
            .as_deref()
            .map(|o| o.contains(INTRO_SKIP_OWNER))
            .unwrap_or(false);
        if self.options.skip_season8_intro && is_season8 {
            INTRO_SKIP_SECS
        } else {
            0.0
        }
    }

    fn companion_payload(&self, record: &VideoRecord, elapsed: f64) -> CompanionPayload {
        let stream = self.locators.stream(&record.video_id);
        CompanionPayload {
            title: record.title.clone(),
            artist: record.artist().to_string(),
            stream_locator: if self.options.adaptive_streaming {
                stream.adaptive
            } else {
                stream.direct
            },
            thumbnail_locator: record
                .thumbnail
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.locators.thumbnail(&record.video_id)),
            elapsed_seconds: elapsed,
            duration_seconds: self.duration(),
            volume: if self.muted { 0.0 } else { self.volume },
        }
    }

    /// Attach `record` to the local element: adaptive first, then the direct
    /// locator once on a fatal error. Returns whether playback started.
    async fn start_local(&mut self, record: &VideoRecord, start_at: f64) -> bool {
        let stream = self.locators.stream(&record.video_id);
        self.attached = false;

        let direct = MediaSource::direct(stream.direct).starting_at(start_at);
        let result = if self.options.adaptive_streaming {
            let adaptive = MediaSource::adaptive(stream.adaptive).starting_at(start_at);
            match self.element.attach(&adaptive).await {
                Err(e) if e.fatal => {
                    log::warn!(
                        "[engine] Adaptive stream failed for {}, falling back to direct: {}",
                        record.video_id,
                        e
                    );
                    self.element.attach(&direct).await
                }
                Err(e) => {
                    log::warn!("[engine] Recoverable stream error for {}: {}", record.video_id, e);
                    Ok(())
                }
                Ok(()) => Ok(()),
            }
        } else {
            self.element.attach(&direct).await
        };

        match result {
            Ok(()) => {
                self.attached = true;
                self.resume_at = 0.0;
                true
            }
            Err(e) => {
                log::error!("[engine] Could not start {}: {}", record.video_id, e);
                false
            }
        }
    }

    /// Make `record` current and start it. The new current record is
    /// published before any stream work begins.
    pub async fn play(&mut self, record: VideoRecord) {
        self.current = Some(record.clone());
        self.events.emit(PlayerEvent::TrackChanged {
            record: record.clone(),
            index: self.queue.current_index(),
        });
        self.views.view_started(&record.video_id);

        if self.owner == ControlOwner::Companion {
            self.companion_elapsed = 0.0;
            let payload = self.companion_payload(&record, 0.0);
            if let Some(companion) = self.companion.as_mut() {
                if let Err(e) = companion.update(&payload) {
                    log::warn!("[engine] Failed to update companion: {}", e);
                }
            }
            self.set_state(PlaybackState::Playing);
            return;
        }

        let start_at = self.intro_offset(&record);
        if self.start_local(&record, start_at).await {
            self.set_state(PlaybackState::Playing);
        } else {
            self.set_state(PlaybackState::Stopped);
        }
    }

    pub async fn add_and_play(&mut self, record: VideoRecord) {
        self.queue.select_or_append(record.clone());
        self.emit_queue_changed();
        self.play(record).await;
    }

    /// Append to the queue. Returns false when the id was already queued.
    pub fn add_to_queue(&mut self, record: VideoRecord) -> bool {
        let added = self.queue.append(record);
        self.emit_queue_changed();
        added
    }

    /// Queue `record` to play right after the current item.
    pub fn add_to_queue_next(&mut self, record: VideoRecord) -> bool {
        let changed = self.queue.insert_next(record);
        self.emit_queue_changed();
        changed
    }

    pub async fn set_queue(&mut self, records: Vec<VideoRecord>, play_first: bool) {
        self.queue.set_records(records, 0);
        self.emit_queue_changed();
        if play_first {
            if let Some(first) = self.queue.current().cloned() {
                self.play(first).await;
            }
        }
    }

    /// Queue a whole listing starting from `record` and play it.
    pub async fn play_from_listing(&mut self, listing: &[VideoRecord], record: VideoRecord) {
        match listing.iter().position(|r| r.same_item(&record)) {
            Some(pos) if listing.len() > 1 => {
                let rotated: Vec<VideoRecord> = listing[pos..]
                    .iter()
                    .chain(listing[..pos].iter())
                    .cloned()
                    .collect();
                self.set_queue(rotated, true).await;
            }
            _ => self.add_and_play(record).await,
        }
    }

    pub async fn play_index(&mut self, index: usize) -> bool {
        let Some(record) = self.queue.select(index).cloned() else {
            return false;
        };
        self.emit_queue_changed();
        self.play(record).await;
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Option<VideoRecord> {
        let removed = self.queue.remove(index);
        if removed.is_some() {
            self.emit_queue_changed();
        }
        removed
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let moved = self.queue.move_item(from, to);
        if moved {
            self.emit_queue_changed();
        }
        moved
    }

    /// Empty the queue. Whatever is playing keeps playing.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.emit_queue_changed();
    }

    pub async fn next(&mut self) {
        let Some(index) = self.queue.next_index() else {
            return;
        };
        if let Some(record) = self.queue.select(index).cloned() {
            self.emit_queue_changed();
            self.play(record).await;
        }
    }

    pub async fn previous(&mut self) {
        if self.current.is_some() && self.position() > RESTART_THRESHOLD_SECS {
            self.seek(0.0);
            return;
        }
        let Some(index) = self.queue.previous_index() else {
            return;
        };
        if let Some(record) = self.queue.select(index).cloned() {
            self.emit_queue_changed();
            self.play(record).await;
        }
    }

    /// End-of-stream handling for whichever surface owns playback.
    pub async fn on_playback_ended(&mut self) {
        if self.queue.repeat_mode() == RepeatMode::One && self.current.is_some() {
            self.restart_current().await;
        } else if self.queue.has_next() {
            self.next().await;
        } else if self.queue.repeat_mode() == RepeatMode::All && !self.queue.is_empty() {
            if let Some(first) = self.queue.select(0).cloned() {
                self.emit_queue_changed();
                self.play(first).await;
            }
        } else {
            if self.owner == ControlOwner::Local {
                self.element.pause();
            }
            self.set_state(PlaybackState::Stopped);
            self.events.emit(PlayerEvent::PlaybackEnded);
        }
    }

    async fn restart_current(&mut self) {
        if self.owner == ControlOwner::Companion {
            // The companion unloads a record that reached its end, so load it again.
            self.companion_elapsed = 0.0;
            if let Some(record) = self.current.clone() {
                let payload = self.companion_payload(&record, 0.0);
                if let Some(companion) = self.companion.as_mut() {
                    if let Err(e) = companion.update(&payload) {
                        log::warn!("[engine] Failed to restart companion playback: {}", e);
                    }
                }
            }
            self.set_state(PlaybackState::Playing);
            return;
        }

        // A finished stream has no decoder left to seek; attach it again.
        if self.attached && !self.element.is_finished() {
            self.element.seek(0.0);
            self.element.play();
            self.set_state(PlaybackState::Playing);
        } else if let Some(record) = self.current.clone() {
            if self.start_local(&record, 0.0).await {
                self.set_state(PlaybackState::Playing);
            } else {
                self.set_state(PlaybackState::Stopped);
            }
        }
        self.emit_progress();
    }

    pub fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        match self.owner {
            ControlOwner::Companion => {
                self.relay_to_companion(&RemoteCommand::Pause);
            }
            ControlOwner::Local => self.element.pause(),
        }
        self.set_state(PlaybackState::Paused);
    }

    /// Resume local playback. Refused while the companion owns control.
    pub async fn resume(&mut self) -> bool {
        if self.owner == ControlOwner::Companion {
            log::info!("[engine] Companion window owns playback; local resume refused");
            return false;
        }
        let Some(record) = self.current.clone() else {
            return match self.queue.current().cloned() {
                Some(record) => {
                    self.play(record).await;
                    self.state == PlaybackState::Playing
                }
                None => false,
            };
        };

        if self.attached && !self.element.is_finished() {
            self.element.play();
        } else if !self.start_local(&record, self.resume_at).await {
            self.set_state(PlaybackState::Stopped);
            return false;
        }
        self.set_state(PlaybackState::Playing);
        true
    }

    pub async fn toggle_play(&mut self) {
        if self.state == PlaybackState::Playing {
            self.pause();
        } else if self.owner == ControlOwner::Companion {
            self.relay_to_companion(&RemoteCommand::Play);
            self.set_state(PlaybackState::Playing);
        } else {
            self.resume().await;
        }
    }

    /// Stop everything and clear the current record.
    pub fn stop(&mut self) {
        if self.owner == ControlOwner::Local {
            self.element.detach();
        } else {
            self.relay_to_companion(&RemoteCommand::Pause);
        }
        self.attached = false;
        self.resume_at = 0.0;
        self.current = None;
        self.set_state(PlaybackState::Stopped);
        self.events.emit(PlayerEvent::PlaybackEnded);
    }

    /// Seek within the current record, clamped to `[0, duration]`.
    pub fn seek(&mut self, seconds: f64) {
        if self.current.is_none() {
            return;
        }
        let duration = self.duration();
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if duration > 0.0 {
            target = target.min(duration);
        }

        match self.owner {
            ControlOwner::Companion => {
                self.companion_elapsed = target;
                self.relay_to_companion(&RemoteCommand::SeekTo(target));
            }
            ControlOwner::Local if self.attached => self.element.seek(target),
            ControlOwner::Local => self.resume_at = target,
        }
        self.emit_progress();
    }

    pub fn seek_relative(&mut self, delta: f64) {
        let target = self.position() + delta;
        self.seek(target);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.element.set_volume(self.volume);
        self.store.persist(KEY_VOLUME, &self.volume);
        self.events.emit(PlayerEvent::VolumeChanged {
            volume: self.volume,
            muted: self.muted,
        });
    }

    /// Unmuting with the volume at zero brings it back to half.
    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.muted = false;
            self.element.set_muted(false);
            let restored = if self.volume > 0.0 { self.volume } else { 0.5 };
            self.set_volume(restored);
        } else {
            self.muted = true;
            self.element.set_muted(true);
            self.events.emit(PlayerEvent::VolumeChanged {
                volume: self.volume,
                muted: true,
            });
        }
        self.store.persist(KEY_MUTED, &self.muted);
    }

    pub fn set_bass_boost(&mut self, db: f32) {
        self.bass_boost = clamp_bass_boost(db);
        self.element.set_bass_boost(self.bass_boost);
        self.store.persist(KEY_BASS_BOOST, &self.bass_boost);
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let shuffled = self.queue.toggle_shuffle();
        self.emit_modes();
        shuffled
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        let mode = self.queue.toggle_repeat();
        self.emit_modes();
        mode
    }

    /// Periodic poll: publishes progress and detects local end of stream.
    pub async fn tick(&mut self) {
        if self.owner != ControlOwner::Local || !self.attached {
            return;
        }
        if self.state == PlaybackState::Playing && self.element.is_finished() {
            self.on_playback_ended().await;
        } else if self.state == PlaybackState::Playing {
            self.emit_progress();
        }
    }

    pub fn persisted_queue(&self) -> PersistedQueueState {
        self.queue.persisted_state()
    }

    /// Restore a saved queue without starting playback.
    pub fn restore_queue(&mut self, state: PersistedQueueState) {
        self.queue.restore_from_persisted(state);
        self.current = self.queue.current().cloned();
        self.attached = false;
        self.resume_at = 0.0;
        self.emit_queue_changed();
        self.emit_modes();
    }

    // Companion hand-off

    /// Pass playback to `companion`. Local audio is torn down before the
    /// companion is told to start, so both never play at once.
    pub fn hand_off(&mut self, mut companion: Box<dyn CompanionSurface>) -> AppResult<()> {
        if self.owner == ControlOwner::Companion {
            return Err(AppError::Companion("Companion window already active".into()));
        }
        let record = self
            .current
            .clone()
            .ok_or_else(|| AppError::Companion("Nothing is playing".into()))?;

        let was_playing = self.state == PlaybackState::Playing;
        let elapsed = self.position();
        self.element.pause();

        let payload = self.companion_payload(&record, elapsed);
        if let Err(e) = companion.open(&payload) {
            log::warn!("[engine] Companion window failed to open: {}", e);
            if was_playing && self.attached {
                self.element.play();
            }
            return Err(e);
        }

        self.element.detach();
        self.attached = false;
        self.companion = Some(companion);
        self.companion_elapsed = elapsed;
        self.owner = ControlOwner::Companion;
        self.events.emit(PlayerEvent::ControlOwnerChanged {
            owner: ControlOwner::Companion,
        });
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Take control back from the companion at `elapsed`. Local playback
    /// resumes only when `resume` is set.
    pub async fn reclaim(&mut self, elapsed: f64, resume: bool) {
        if self.owner != ControlOwner::Companion {
            return;
        }
        if let Some(mut companion) = self.companion.take() {
            companion.close();
        }
        self.owner = ControlOwner::Local;
        self.attached = false;
        self.resume_at = elapsed.max(0.0);
        self.events.emit(PlayerEvent::ControlOwnerChanged {
            owner: ControlOwner::Local,
        });

        let Some(record) = self.current.clone() else {
            self.set_state(PlaybackState::Stopped);
            return;
        };
        if resume {
            if self.start_local(&record, elapsed.max(0.0)).await {
                self.set_state(PlaybackState::Playing);
            } else {
                self.set_state(PlaybackState::Stopped);
            }
        } else {
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn note_companion_position(&mut self, elapsed: f64) {
        if self.owner == ControlOwner::Companion && elapsed.is_finite() {
            self.companion_elapsed = elapsed.max(0.0);
        }
    }

    /// Forward a transport command to the companion, if it owns control.
    pub fn relay_to_companion(&mut self, command: &RemoteCommand) -> bool {
        if self.owner != ControlOwner::Companion {
            return false;
        }
        match self.companion.as_mut() {
            Some(companion) => {
                if let Err(e) = companion.command(command) {
                    log::warn!("[engine] Companion command {:?} failed: {}", command, e);
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::{FakeElement, RecordingViews};
    use tempfile::TempDir;

    fn rec(id: &str) -> VideoRecord {
        VideoRecord::new(id, id.to_uppercase())
    }

    fn engine(dir: &TempDir) -> (PlaybackEngine<FakeElement>, Arc<RecordingViews>) {
        let views = Arc::new(RecordingViews::default());
        let engine = PlaybackEngine::new(
            FakeElement::default(),
            Locators::new(&AppConfig::default()),
            views.clone(),
            PreferenceStore::new(dir.path()),
            EventBus::default(),
            EngineOptions::default(),
        );
        (engine, views)
    }

    #[tokio::test]
    async fn play_publishes_track_before_stream_work() {
        let dir = TempDir::new().unwrap();
        let (mut engine, views) = engine(&dir);
        let mut rx = engine.events().subscribe();

        engine.add_and_play(rec("a")).await;

        assert_eq!(engine.current().unwrap().video_id, "a");
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(views.seen(), vec!["a".to_string()]);
        let mut saw_track = false;
        while let Ok(event) = rx.try_recv() {
            if let PlayerEvent::TrackChanged { record, .. } = event {
                assert_eq!(record.video_id, "a");
                saw_track = true;
            }
        }
        assert!(saw_track);
    }

    #[tokio::test]
    async fn fatal_adaptive_error_falls_back_once() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.element_mut().fail_adaptive = Some(true);

        engine.add_and_play(rec("a")).await;

        let kinds: Vec<_> = engine.element().attaches.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::audio::element::SourceKind::Adaptive,
                crate::audio::element::SourceKind::Direct
            ]
        );
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn double_failure_silently_does_not_start() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.element_mut().fail_adaptive = Some(true);
        engine.element_mut().fail_direct = true;

        engine.add_and_play(rec("a")).await;

        assert_eq!(engine.element().attaches.len(), 2);
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.current().unwrap().video_id, "a");
    }

    #[tokio::test]
    async fn recoverable_error_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.element_mut().fail_adaptive = Some(false);

        engine.add_and_play(rec("a")).await;
        assert_eq!(engine.element().attaches.len(), 1);
    }

    #[tokio::test]
    async fn without_adaptive_support_direct_is_used() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.options.adaptive_streaming = false;

        engine.add_and_play(rec("a")).await;
        let attached = &engine.element().attaches;
        assert_eq!(attached.len(), 1);
        assert!(attached[0].url.ends_with("/webapi/media/video/a"));
    }

    #[tokio::test]
    async fn previous_restarts_after_threshold() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.set_queue(vec![rec("a"), rec("b")], false).await;
        engine.play_index(1).await;

        engine.element_mut().position = 3.1;
        engine.previous().await;
        assert_eq!(engine.current().unwrap().video_id, "b");
        assert_eq!(engine.position(), 0.0);

        engine.element_mut().position = 2.9;
        engine.previous().await;
        assert_eq!(engine.current().unwrap().video_id, "a");
        assert_eq!(engine.queue().current_index(), Some(0));
    }

    #[tokio::test]
    async fn ended_without_next_stops_and_notifies() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.add_and_play(rec("a")).await;
        let mut rx = engine.events().subscribe();

        engine.on_playback_ended().await;

        assert_eq!(engine.state(), PlaybackState::Stopped);
        let mut ended = false;
        while let Ok(event) = rx.try_recv() {
            ended |= matches!(event, PlayerEvent::PlaybackEnded);
        }
        assert!(ended);
    }

    #[tokio::test]
    async fn tick_detects_end_of_stream() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.set_queue(vec![rec("a"), rec("b")], true).await;

        engine.element_mut().finished = true;
        engine.tick().await;
        assert_eq!(engine.current().unwrap().video_id, "b");
    }

    #[tokio::test]
    async fn intro_skip_starts_at_eight_seconds() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.set_skip_season8_intro(true);

        engine.add_and_play(rec("a").with_owner("Saison 8")).await;
        assert_eq!(engine.element().attaches[0].start_at, INTRO_SKIP_SECS);

        engine.add_and_play(rec("b").with_owner("Saison 7")).await;
        assert_eq!(engine.element().attaches[1].start_at, 0.0);
    }

    #[tokio::test]
    async fn seek_is_clamped_to_duration() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.element_mut().duration = 100.0;
        engine.add_and_play(rec("a")).await;

        engine.seek(250.0);
        assert_eq!(engine.position(), 100.0);
        engine.seek_relative(-500.0);
        assert_eq!(engine.position(), 0.0);
    }

    #[test]
    fn volume_and_mute_persist() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        assert_eq!(engine.volume(), crate::store::DEFAULT_VOLUME);

        engine.set_volume(1.7);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(0.0);
        assert_eq!(engine.volume_icon(), VolumeIcon::Muted);

        engine.toggle_mute();
        assert!(engine.is_muted());
        engine.toggle_mute();
        assert!(!engine.is_muted());
        assert_eq!(engine.volume(), 0.5);
        assert_eq!(engine.volume_icon(), VolumeIcon::Audible);

        let store = PreferenceStore::new(dir.path());
        assert_eq!(store.volume(), 0.5);
        assert!(!store.muted());
    }

    #[test]
    fn bass_boost_is_clamped_and_applied() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.set_bass_boost(22.0);
        assert_eq!(engine.bass_boost(), 15.0);
        assert_eq!(engine.element().bass_boost, 15.0);
        assert_eq!(PreferenceStore::new(dir.path()).bass_boost(), 15.0);
    }

    #[tokio::test]
    async fn play_from_listing_rotates_to_chosen_record() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        let listing = vec![rec("a"), rec("b"), rec("c")];

        engine.play_from_listing(&listing, rec("b")).await;

        let ids: Vec<_> = engine
            .queue()
            .records()
            .iter()
            .map(|r| r.video_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(engine.current().unwrap().video_id, "b");
    }

    #[tokio::test]
    async fn restored_queue_waits_for_resume() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.restore_queue(PersistedQueueState {
            records: vec![rec("a"), rec("b")],
            current_index: Some(1),
            ..PersistedQueueState::default()
        });

        assert!(engine.element().attaches.is_empty());
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert!(engine.resume().await);
        assert_eq!(engine.element().attaches.len(), 1);
        assert!(engine.element().attaches[0].url.contains("/b/"));
    }

    #[tokio::test]
    async fn stop_clears_current() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir);
        engine.add_and_play(rec("a")).await;
        engine.stop();
        assert!(engine.current().is_none());
        assert!(!engine.element().playing);
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }
}
