use crate::error::AttachError;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Segmented HLS manifest.
    Adaptive,
    /// Single media file.
    Direct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    pub kind: SourceKind,
    /// Position to start from, in seconds.
    pub start_at: f64,
}

impl MediaSource {
    pub fn adaptive(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Adaptive,
            start_at: 0.0,
        }
    }

    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Direct,
            start_at: 0.0,
        }
    }

    pub fn starting_at(mut self, seconds: f64) -> Self {
        self.start_at = seconds.max(0.0);
        self
    }
}

/// The single underlying playback handle driven by the engine.
///
/// `attach` replaces whatever stream is currently attached; implementations
/// must tear the previous one down before opening the new one. A successful
/// attach leaves the element playing.
pub trait MediaElement: Send + 'static {
    fn attach(
        &mut self,
        source: &MediaSource,
    ) -> impl Future<Output = Result<(), AttachError>> + Send;

    /// Drop the attached stream, if any.
    fn detach(&mut self);

    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position_seconds: f64);

    fn position_seconds(&self) -> f64;
    fn duration_seconds(&self) -> f64;
    fn is_playing(&self) -> bool;

    /// True once an attached stream has played to its end.
    fn is_finished(&self) -> bool;

    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);

    /// Low-shelf gain in dB, 0 disables the filter.
    fn set_bass_boost(&mut self, db: f32);
}
