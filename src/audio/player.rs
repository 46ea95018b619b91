use crate::audio::decoder::AudioDecoder;
use crate::audio::dsp::{clamp_bass_boost, LowShelf};
use crate::audio::element::{MediaElement, MediaSource, SourceKind};
use crate::audio::hls;
use crate::audio::output::{open_output, OutputHandle, OutputShared};
use crate::audio::stream_source::{HttpStreamSource, StreamWriter};
use crate::error::{AppError, AttachError};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sentinel value meaning "no seek requested".
const NO_SEEK: u64 = u64::MAX;

/// How long probing may wait for the first bytes of a stream.
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// The real media element: downloads a stream (HLS segments or a single
/// file), decodes its audio with symphonia and feeds the output sink.
pub struct AudioPlayer {
    client: reqwest::Client,
    shared: Arc<OutputShared>,
    output: Option<OutputHandle>,
    sample_rate: u32,
    channels: usize,
    total_duration: f64,
    /// Low-shelf gain as f32 bits, read by the decode thread.
    bass_db: Arc<AtomicU32>,
    /// Seek target in milliseconds (NO_SEEK = no pending seek).
    /// The decode thread reads and clears this.
    seek_target_ms: Arc<AtomicU64>,
    decode_handle: Option<std::thread::JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    download: Option<tokio::task::JoinHandle<()>>,
}

impl AudioPlayer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            shared: Arc::new(OutputShared::new()),
            output: None,
            sample_rate: 44100,
            channels: 2,
            total_duration: 0.0,
            bass_db: Arc::new(AtomicU32::new(0f32.to_bits())),
            seek_target_ms: Arc::new(AtomicU64::new(NO_SEEK)),
            decode_handle: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            download: None,
        }
    }

    pub fn start_download(
        writer: StreamWriter,
        url: String,
        client: reqwest::Client,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            log::info!("Starting media download: {}...", &url[..url.len().min(100)]);
            match client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let content_type = response
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown")
                        .to_string();

                    log::info!(
                        "Media download response: status={}, content-type={}",
                        status,
                        content_type
                    );

                    if !status.is_success() {
                        writer.set_error(format!("Download failed: HTTP {}", status));
                        return;
                    }

                    use futures_util::StreamExt;
                    let mut stream = response.bytes_stream();
                    let mut total_bytes = 0u64;
                    while let Some(chunk) = stream.next().await {
                        match chunk {
                            Ok(bytes) => {
                                total_bytes += bytes.len() as u64;
                                if writer.write_bytes(&bytes).is_err() {
                                    log::debug!(
                                        "Media download: reader closed after {} bytes",
                                        total_bytes
                                    );
                                    return;
                                }
                            }
                            Err(e) => {
                                log::error!(
                                    "Media download stream error after {} bytes: {}",
                                    total_bytes,
                                    e
                                );
                                writer.set_error(format!("Download error: {}", e));
                                return;
                            }
                        }
                    }
                    log::info!("Media download complete: {} bytes", total_bytes);
                    writer.finish();
                }
                Err(e) => {
                    log::error!("Failed to start media download: {}", e);
                    writer.set_error(format!("Failed to start download: {}", e));
                }
            }
        })
    }

    /// Start fetching `source` and return the reader end plus a probe hint
    /// and any duration known up front.
    async fn open_stream(
        &mut self,
        source: &MediaSource,
    ) -> Result<(HttpStreamSource, Option<String>, Option<f64>), AttachError> {
        let (reader, writer) = HttpStreamSource::new();
        match source.kind {
            SourceKind::Adaptive => {
                let playlist = hls::load(&self.client, &source.url)
                    .await
                    .map_err(|e| AttachError::fatal(format!("Manifest load failed: {}", e)))?;
                let hint = playlist.extension_hint();
                let duration = playlist.total_duration();
                self.download = Some(hls::start_segment_download(
                    writer,
                    playlist,
                    self.client.clone(),
                ));
                Ok((reader, hint, Some(duration)))
            }
            SourceKind::Direct => {
                let hint = url::Url::parse(&source.url).ok().and_then(|u| {
                    u.path()
                        .rsplit_once('.')
                        .map(|(_, ext)| ext.to_string())
                });
                self.download = Some(Self::start_download(
                    writer,
                    source.url.clone(),
                    self.client.clone(),
                ));
                Ok((reader, hint, None))
            }
        }
    }

    async fn probe(
        &mut self,
        reader: HttpStreamSource,
        hint: Option<String>,
    ) -> Result<AudioDecoder, AttachError> {
        let probe = tokio::task::spawn_blocking(move || AudioDecoder::new(reader, hint.as_deref()));
        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(Ok(decoder))) => Ok(decoder),
            Ok(Ok(Err(e))) => Err(AttachError::from(e)),
            Ok(Err(join)) => Err(AttachError::fatal(format!("Probe task failed: {}", join))),
            Err(_) => {
                // Dropping the download wakes the blocked probe with an error.
                if let Some(download) = self.download.take() {
                    download.abort();
                }
                Err(AttachError::fatal("Timed out waiting for stream data"))
            }
        }
    }

    fn start_decoding(&mut self, mut decoder: AudioDecoder) -> Result<(), AppError> {
        let sr = decoder.sample_rate();
        let ch = decoder.channels();
        self.sample_rate = sr;
        self.channels = ch;

        self.shared.samples_played.store(0, Ordering::SeqCst);
        self.seek_target_ms.store(NO_SEEK, Ordering::SeqCst);
        {
            let (lock, cvar) = &self.shared.ring;
            let mut ring = lock.lock().unwrap();
            ring.buffer.clear();
            ring.finished = false;
            cvar.notify_all();
        }

        self.output = Some(open_output(Arc::clone(&self.shared), sr, ch)?);

        let shared = Arc::clone(&self.shared);
        let stop_signal = Arc::new(AtomicBool::new(false));
        self.stop_signal = Arc::clone(&stop_signal);
        let seek_target = Arc::clone(&self.seek_target_ms);
        let bass_db = Arc::clone(&self.bass_db);

        let handle = std::thread::spawn(move || {
            const MAX_RING_SAMPLES: usize = 176400;
            let mut shelf = LowShelf::new(sr, ch, f32::from_bits(bass_db.load(Ordering::Relaxed)));

            loop {
                if stop_signal.load(Ordering::Relaxed) {
                    break;
                }

                let pending_seek = seek_target.swap(NO_SEEK, Ordering::SeqCst);
                if pending_seek != NO_SEEK {
                    let seek_seconds = pending_seek as f64 / 1000.0;
                    log::info!("Decode thread: seeking to {:.2}s", seek_seconds);

                    {
                        let (lock, cvar) = &shared.ring;
                        let mut ring = lock.lock().unwrap();
                        ring.buffer.clear();
                        cvar.notify_all();
                    }

                    if let Err(e) = decoder.seek(seek_seconds) {
                        log::error!("Decode thread: seek failed: {}", e);
                    }

                    let new_samples = (seek_seconds * sr as f64 * ch as f64) as u64;
                    shared.samples_played.store(new_samples, Ordering::SeqCst);
                    continue;
                }

                {
                    let (lock, cvar) = &shared.ring;
                    let mut ring = lock.lock().unwrap();
                    while ring.buffer.len() >= MAX_RING_SAMPLES
                        && !stop_signal.load(Ordering::Relaxed)
                        && seek_target.load(Ordering::Relaxed) == NO_SEEK
                    {
                        ring = cvar.wait(ring).unwrap();
                    }
                }

                if stop_signal.load(Ordering::Relaxed) {
                    break;
                }

                if seek_target.load(Ordering::Relaxed) != NO_SEEK {
                    continue;
                }

                let wanted_db = f32::from_bits(bass_db.load(Ordering::Relaxed));
                if wanted_db != shelf.gain_db() {
                    shelf = LowShelf::new(sr, ch, wanted_db);
                }

                match decoder.decode_next() {
                    Ok(Some(mut decoded)) => {
                        shelf.process_interleaved(&mut decoded.samples);
                        let (lock, cvar) = &shared.ring;
                        let mut ring = lock.lock().unwrap();
                        ring.buffer.extend(decoded.samples.iter());
                        cvar.notify_all();
                    }
                    Ok(None) => {
                        let (lock, cvar) = &shared.ring;
                        let mut ring = lock.lock().unwrap();
                        ring.finished = true;
                        cvar.notify_all();
                        break;
                    }
                    Err(e) => {
                        // Treat a broken stream as ended rather than hanging.
                        log::error!("Decode error: {}", e);
                        let (lock, cvar) = &shared.ring;
                        let mut ring = lock.lock().unwrap();
                        ring.finished = true;
                        cvar.notify_all();
                        break;
                    }
                }
            }
        });

        self.decode_handle = Some(handle);
        Ok(())
    }

    fn stop_internal(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.shared.playing.store(false, Ordering::SeqCst);

        {
            let (_lock, cvar) = &self.shared.ring;
            cvar.notify_all();
        }

        if let Some(handle) = self.decode_handle.take() {
            let _ = handle.join();
        }
        if let Some(download) = self.download.take() {
            download.abort();
        }

        self.output = None;
        self.stop_signal = Arc::new(AtomicBool::new(false));
        {
            let (lock, _) = &self.shared.ring;
            let mut ring = lock.lock().unwrap();
            ring.buffer.clear();
            ring.finished = false;
        }
    }
}

impl MediaElement for AudioPlayer {
    async fn attach(&mut self, source: &MediaSource) -> Result<(), AttachError> {
        self.stop_internal();
        self.shared.samples_played.store(0, Ordering::SeqCst);

        let (reader, hint, known_duration) = self.open_stream(source).await?;
        let decoder = match self.probe(reader, hint).await {
            Ok(decoder) => decoder,
            Err(e) => {
                self.stop_internal();
                return Err(e);
            }
        };
        self.total_duration = known_duration
            .filter(|d| *d > 0.0)
            .or(decoder.duration_seconds())
            .unwrap_or(0.0);

        if let Err(e) = self.start_decoding(decoder) {
            self.stop_internal();
            return Err(AttachError::fatal(e.to_string()));
        }
        if source.start_at > 0.0 {
            self.seek(source.start_at);
        }
        self.shared.playing.store(true, Ordering::SeqCst);
        log::info!(
            "Attached {:?} stream ({:.1}s)",
            source.kind,
            self.total_duration
        );
        Ok(())
    }

    fn detach(&mut self) {
        self.stop_internal();
        self.shared.samples_played.store(0, Ordering::SeqCst);
        self.total_duration = 0.0;
    }

    fn play(&mut self) {
        if self.decode_handle.is_some() {
            self.shared.playing.store(true, Ordering::SeqCst);
        }
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
    }

    fn seek(&mut self, position_seconds: f64) {
        let position_seconds = position_seconds.max(0.0);
        // Send seek request to the decode thread (in milliseconds for precision)
        let ms = (position_seconds * 1000.0) as u64;
        self.seek_target_ms.store(ms, Ordering::SeqCst);

        let (_lock, cvar) = &self.shared.ring;
        cvar.notify_all();

        // Immediately update the position counter for responsive UI
        let sample_position =
            (position_seconds * self.sample_rate as f64 * self.channels as f64) as u64;
        self.shared
            .samples_played
            .store(sample_position, Ordering::SeqCst);
    }

    fn position_seconds(&self) -> f64 {
        let samples = self.shared.samples_played.load(Ordering::Relaxed) as f64;
        let sr = self.sample_rate as f64;
        let ch = self.channels as f64;
        if sr > 0.0 && ch > 0.0 {
            samples / (sr * ch)
        } else {
            0.0
        }
    }

    fn duration_seconds(&self) -> f64 {
        self.total_duration
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        if self.decode_handle.is_none() {
            return false;
        }
        let (lock, _) = &self.shared.ring;
        let ring = lock.lock().unwrap();
        ring.finished && ring.buffer.is_empty()
    }

    fn set_volume(&mut self, volume: f32) {
        *self.shared.volume.lock().unwrap() = volume.clamp(0.0, 1.0);
    }

    fn set_muted(&mut self, muted: bool) {
        self.shared.muted.store(muted, Ordering::SeqCst);
    }

    fn set_bass_boost(&mut self, db: f32) {
        self.bass_db
            .store(clamp_bass_boost(db).to_bits(), Ordering::SeqCst);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop_internal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_manifest_is_fatal() {
        let mut player = AudioPlayer::new(reqwest::Client::new());
        let err = player
            .attach(&MediaSource::adaptive("http://127.0.0.1:1/master.m3u8"))
            .await
            .unwrap_err();
        assert!(err.fatal);
        assert!(!player.is_playing());
        assert!(!player.is_finished());
    }

    #[tokio::test]
    async fn unreachable_direct_file_fails_to_attach() {
        let mut player = AudioPlayer::new(reqwest::Client::new());
        assert!(player
            .attach(&MediaSource::direct("http://127.0.0.1:1/video/abc"))
            .await
            .is_err());
    }

    #[test]
    fn idle_player_reports_nothing() {
        let mut player = AudioPlayer::new(reqwest::Client::new());
        player.play();
        assert!(!player.is_playing());
        assert_eq!(player.position_seconds(), 0.0);
        player.set_bass_boost(99.0);
        assert_eq!(f32::from_bits(player.bass_db.load(Ordering::SeqCst)), 15.0);
    }
}
