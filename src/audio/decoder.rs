use crate::audio::stream_source::HttpStreamSource;
use crate::error::{AppError, AppResult};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub struct AudioDecoder {
    format_reader: Box<dyn symphonia::core::formats::FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<f64>,
}

pub struct DecodedSamples {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Map a container extension or codec name to the extension symphonia's
/// probe understands.
fn probe_extension(hint: &str) -> Option<&'static str> {
    match hint.to_lowercase().as_str() {
        "mp4" | "m4s" | "m4a" | "m4v" | "mov" | "aac" | "mp4a" | "mp4a.40.2" => Some("mp4"),
        "mkv" | "webm" => Some("mkv"),
        "mp3" => Some("mp3"),
        "flac" => Some("flac"),
        "ogg" | "opus" => Some("ogg"),
        "wav" => Some("wav"),
        other => {
            log::warn!("Unknown container hint: {}", other);
            None
        }
    }
}

impl AudioDecoder {
    /// Probe the container and open its first decodable audio track. Blocks
    /// until enough bytes have arrived to identify the format.
    pub fn new(source: HttpStreamSource, container_hint: Option<&str>) -> AppResult<Self> {
        log::info!("AudioDecoder::new with container_hint={:?}", container_hint);
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = container_hint.and_then(probe_extension) {
            hint.with_extension(ext);
        }

        log::info!("Probing media format...");
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AppError::Decode(format!("Failed to probe format: {}", e)))?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| AppError::Decode("No supported audio track found".into()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let duration = match (track.codec_params.time_base, track.codec_params.n_frames) {
            (Some(tb), Some(frames)) => {
                let time = tb.calc_time(frames);
                Some(time.seconds as f64 + time.frac)
            }
            _ => None,
        };

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AppError::Decode(format!("Failed to create decoder: {}", e)))?;

        log::info!(
            "AudioDecoder ready: track_id={}, sample_rate={}, channels={}, duration={:?}",
            track_id,
            sample_rate,
            channels,
            duration
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
        })
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Seek to a position in the stream (in seconds).
    pub fn seek(&mut self, position_seconds: f64) -> AppResult<()> {
        use symphonia::core::formats::SeekTo;
        use symphonia::core::units::Time;

        let time = Time {
            seconds: position_seconds as u64,
            frac: position_seconds.fract(),
        };

        self.format_reader
            .seek(
                symphonia::core::formats::SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AppError::Decode(format!("Seek failed: {}", e)))?;

        // Reset the decoder state after seeking
        self.decoder.reset();

        Ok(())
    }

    /// Decode the next batch of samples. Returns None at EOF.
    pub fn decode_next(&mut self) -> AppResult<Option<DecodedSamples>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("Decode error (skipping): {}", msg);
                    continue;
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to decode: {}", e))),
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            let channels = spec.channels.count();

            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(DecodedSamples {
                samples: sample_buf.samples().to_vec(),
                sample_rate: spec.rate,
                channels,
            }));
        }
    }
}
