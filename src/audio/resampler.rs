//! Sample rate conversion using rubato
//!
//! Whole-buffer conversion shared by the decode normalization path and the
//! resample stage. Pure function of its inputs, so pipeline runs stay
//! deterministic.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio to a new rate.
///
/// # Arguments
/// - `input`: Interleaved audio samples
/// - `input_rate`: Input sample rate in Hz
/// - `output_rate`: Target sample rate in Hz
/// - `channels`: Number of channels
///
/// # Notes
/// Returns a copy when input already matches the target rate.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        debug!("Sample rate already at {}Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }

    if input.is_empty() {
        return Ok(Vec::new());
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} channels)",
        input_rate, output_rate, channels
    );

    // rubato expects planar input, one Vec per channel
    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0, // no runtime ratio changes
        PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Internal(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Internal(format!("Resampling failed: {}", e)))?;

    let interleaved = interleave(planar_output);

    debug!(
        "Resampled {} input frames to {} output frames",
        input_frames,
        interleaved.len() / channels as usize
    );

    Ok(interleaved)
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;
    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

    for frame in samples.chunks_exact(num_channels) {
        for (ch_idx, sample) in frame.iter().enumerate() {
            planar[ch_idx].push(*sample);
        }
    }

    planar
}

/// Convert planar samples back to interleaved format
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }

    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for channel in &planar {
            interleaved.push(channel[frame_idx]);
        }
    }

    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&interleaved, 2);

        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_interleave() {
        let planar = vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]];
        assert_eq!(interleave(planar), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_same_rate_copies() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = resample(&input, 44100, 44100, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_downsample_length() {
        let input_rate = 44100;
        let output_rate = 16000;
        let frames = 4410;

        let mut input = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / input_rate as f32;
            let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            input.push(s);
            input.push(s);
        }

        let output = resample(&input, input_rate, output_rate, 2).unwrap();
        let output_frames = output.len() / 2;
        let expected = (frames as f64 * output_rate as f64 / input_rate as f64) as usize;

        assert!(
            output_frames.abs_diff(expected) <= 10,
            "Expected ~{} frames, got {}",
            expected,
            output_frames
        );
    }

    #[test]
    fn test_deterministic() {
        let input: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.01).sin() * 0.4)
            .collect();

        let a = resample(&input, 48000, 44100, 1).unwrap();
        let b = resample(&input, 48000, 44100, 1).unwrap();
        assert_eq!(a, b);
    }
}
