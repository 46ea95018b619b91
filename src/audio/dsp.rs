use std::f32::consts::PI;

pub const BASS_SHELF_HZ: f32 = 200.0;
pub const MAX_BASS_BOOST_DB: f32 = 15.0;

pub fn clamp_bass_boost(db: f32) -> f32 {
    if db.is_finite() {
        db.clamp(0.0, MAX_BASS_BOOST_DB)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Low-shelf biquad (RBJ cookbook, shelf slope 1) over interleaved samples.
#[derive(Debug, Clone)]
pub struct LowShelf {
    gain_db: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    states: Vec<BiquadState>,
}

impl LowShelf {
    pub fn new(sample_rate: u32, channels: usize, gain_db: f32) -> Self {
        let gain_db = clamp_bass_boost(gain_db);
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * BASS_SHELF_HZ / sample_rate.max(1) as f32;
        let cos = w0.cos();
        let alpha = w0.sin() / 2.0 * 2f32.sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos);
        let a2 = (a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha;

        Self {
            gain_db,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            states: vec![BiquadState::default(); channels.max(1)],
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn process_interleaved(&mut self, samples: &mut [f32]) {
        if self.gain_db == 0.0 {
            return;
        }
        let channels = self.states.len();
        for frame in samples.chunks_mut(channels) {
            for (sample, s) in frame.iter_mut().zip(self.states.iter_mut()) {
                let x = *sample;
                let y = self.b0 * x + self.b1 * s.x1 + self.b2 * s.x2 - self.a1 * s.y1 - self.a2 * s.y2;
                s.x2 = s.x1;
                s.x1 = x;
                s.y2 = s.y1;
                s.y1 = y;
                *sample = y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gain_is_passthrough() {
        let mut filter = LowShelf::new(44100, 2, 0.0);
        let mut samples = vec![0.5, -0.25, 0.1, 0.3];
        filter.process_interleaved(&mut samples);
        assert_eq!(samples, vec![0.5, -0.25, 0.1, 0.3]);
    }

    #[test]
    fn dc_is_boosted_by_the_shelf_gain() {
        let mut filter = LowShelf::new(44100, 1, 12.0);
        let mut samples = vec![0.1f32; 44100];
        filter.process_interleaved(&mut samples);
        let expected = 0.1 * 10f32.powf(12.0 / 20.0);
        let settled = *samples.last().unwrap();
        assert!((settled - expected).abs() < 1e-3, "{} vs {}", settled, expected);
    }

    #[test]
    fn nyquist_is_left_alone() {
        let mut filter = LowShelf::new(48000, 1, 15.0);
        let mut samples: Vec<f32> = (0..4800).map(|i| if i % 2 == 0 { 0.2 } else { -0.2 }).collect();
        filter.process_interleaved(&mut samples);
        let peak = samples[4000..].iter().fold(0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.2).abs() < 0.02, "peak {}", peak);
    }

    #[test]
    fn gain_is_clamped() {
        assert_eq!(LowShelf::new(44100, 2, 40.0).gain_db(), MAX_BASS_BOOST_DB);
        assert_eq!(clamp_bass_boost(-3.0), 0.0);
        assert_eq!(clamp_bass_boost(f32::NAN), 0.0);
    }
}
