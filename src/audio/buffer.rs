//! Canonical PCM audio buffer
//!
//! All pipeline stages consume and produce this representation: interleaved
//! f32 samples in [-1.0, 1.0] with an explicit sample rate and channel count.
//! Stages never mutate their input; each produces a fresh buffer.

/// Canonical PCM representation flowing through the pipeline.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved by channel: [ch0, ch1, ch0, ch1, ...] for stereo
/// - Invariant: `samples.len()` is an exact multiple of `channels`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz (always > 0)
    pub sample_rate: u32,

    /// Channel count (>= 1)
    pub channels: u16,

    /// PCM audio samples, interleaved
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Create a new buffer. Trailing samples that do not fill a complete
    /// frame are dropped to preserve the length invariant.
    pub fn new(sample_rate: u32, channels: u16, mut samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let remainder = samples.len() % channels as usize;
        if remainder != 0 {
            samples.truncate(samples.len() - remainder);
        }

        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Number of complete frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }

    /// Peak absolute sample value (0.0 for an empty buffer)
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square level across all samples (0.0 for an empty buffer)
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt() as f32
    }

    /// True when every sample is finite (no NaN or infinity)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Peak absolute value of one frame
    pub fn frame_peak(&self, frame_index: usize) -> f32 {
        let start = frame_index * self.channels as usize;
        let end = start + self.channels as usize;
        if end > self.samples.len() {
            return 0.0;
        }
        self.samples[start..end]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
