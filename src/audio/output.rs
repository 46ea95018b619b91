//! Sample sinks. With `native-audio` decoded samples go to the default cpal
//! output device; otherwise a clock thread consumes them in real time so
//! position, end-of-stream and pause behave the same without a sound card.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

#[cfg(feature = "native-audio")]
use crate::error::AppError;
use crate::error::AppResult;

/// Ring buffer between the decode thread and the output.
pub struct SampleRingBuffer {
    pub buffer: VecDeque<f32>,
    pub finished: bool,
}

/// State shared by the decode thread, the output and the player handle.
pub struct OutputShared {
    pub ring: (Mutex<SampleRingBuffer>, Condvar),
    pub volume: Mutex<f32>,
    pub muted: AtomicBool,
    pub playing: AtomicBool,
    /// Interleaved samples consumed since the start of the stream.
    pub samples_played: AtomicU64,
}

impl OutputShared {
    pub fn new() -> Self {
        Self {
            ring: (
                Mutex::new(SampleRingBuffer {
                    buffer: VecDeque::with_capacity(88200),
                    finished: false,
                }),
                Condvar::new(),
            ),
            volume: Mutex::new(1.0),
            muted: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            samples_played: AtomicU64::new(0),
        }
    }

    fn gain(&self) -> f32 {
        if self.muted.load(Ordering::Relaxed) {
            0.0
        } else {
            *self.volume.lock().unwrap()
        }
    }

    /// Move up to `data.len()` samples out of the ring, scaled by the gain.
    /// Returns how many were real samples; the rest is silence.
    pub fn fill(&self, data: &mut [f32]) -> usize {
        if !self.playing.load(Ordering::Relaxed) {
            data.fill(0.0);
            return 0;
        }

        let gain = self.gain();
        let (lock, cvar) = &self.ring;
        let mut ring = lock.lock().unwrap();

        let available = ring.buffer.len().min(data.len());
        for (i, sample) in data.iter_mut().enumerate() {
            if i < available {
                *sample = ring.buffer.pop_front().unwrap_or(0.0) * gain;
            } else {
                *sample = 0.0;
            }
        }

        self.samples_played
            .fetch_add(available as u64, Ordering::Relaxed);
        cvar.notify_all();
        available
    }
}

impl Default for OutputShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the active sink alive; dropping it stops output.
pub struct OutputHandle {
    #[cfg(feature = "native-audio")]
    _stream: SendStream,
    #[cfg(not(feature = "native-audio"))]
    stop: Arc<AtomicBool>,
}

#[cfg(feature = "native-audio")]
struct SendStream(cpal::Stream);
// cpal::Stream is only non-Send because of CoreAudio; it is created and
// dropped by the single owning player.
#[cfg(feature = "native-audio")]
unsafe impl Send for SendStream {}
#[cfg(feature = "native-audio")]
unsafe impl Sync for SendStream {}

#[cfg(feature = "native-audio")]
pub fn open_output(
    shared: Arc<OutputShared>,
    sample_rate: u32,
    channels: usize,
) -> AppResult<OutputHandle> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AppError::Audio("No output device available".into()))?;

    let stream_config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                shared.fill(data);
            },
            |err| {
                log::error!("cpal output error: {}", err);
            },
            None,
        )
        .map_err(|e| AppError::Audio(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AppError::Audio(format!("Failed to start playback: {}", e)))?;

    Ok(OutputHandle {
        _stream: SendStream(stream),
    })
}

#[cfg(not(feature = "native-audio"))]
pub fn open_output(
    shared: Arc<OutputShared>,
    sample_rate: u32,
    channels: usize,
) -> AppResult<OutputHandle> {
    const TICK: std::time::Duration = std::time::Duration::from_millis(10);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clock = Arc::clone(&stop);
    let per_tick = (sample_rate as usize * channels.max(1)) / 100;

    std::thread::Builder::new()
        .name("protoplayer-clock".into())
        .spawn(move || {
            let mut scratch = vec![0f32; per_tick.max(1)];
            while !stop_clock.load(Ordering::Relaxed) {
                shared.fill(&mut scratch);
                std::thread::sleep(TICK);
            }
        })?;

    Ok(OutputHandle { stop })
}

#[cfg(not(feature = "native-audio"))]
impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
