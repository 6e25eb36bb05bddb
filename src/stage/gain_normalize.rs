//! Gain-normalize stage
//!
//! Scales the buffer so its peak or RMS level hits a target in dBFS. Peak
//! mode never clips for targets at or below 0 dB; RMS mode can push peaks
//! past full scale, in which case samples are clamped and a warning is
//! recorded.

use crate::audio::AudioBuffer;
use crate::error::Result;
use crate::stage::{db_to_linear, ParamSpec, Stage, StageDefinition, StageOutput, StageParams};

pub struct GainNormalize;

impl Stage for GainNormalize {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "gain-normalize",
            params: vec![
                ParamSpec::float("target_db", -3.0, -60.0, 0.0),
                ParamSpec::choice("mode", "peak", &["peak", "rms"]),
            ],
        }
    }

    fn transform(&self, input: &AudioBuffer, params: &StageParams) -> Result<StageOutput> {
        let target = db_to_linear(params.float("target_db")?);
        let mode = params.str("mode")?;

        let level = match mode {
            "rms" => input.rms(),
            _ => input.peak(),
        };

        if level == 0.0 {
            return Ok(StageOutput {
                buffer: input.clone(),
                warnings: vec!["buffer is silent, gain not applied".to_string()],
            });
        }

        let gain = target / level;
        let mut clipped = false;
        let samples: Vec<f32> = input
            .samples
            .iter()
            .map(|s| {
                let scaled = s * gain;
                if scaled.abs() > 1.0 {
                    clipped = true;
                    scaled.clamp(-1.0, 1.0)
                } else {
                    scaled
                }
            })
            .collect();

        let mut warnings = Vec::new();
        if clipped {
            warnings.push("normalization clipped samples at full scale".to_string());
        }

        Ok(StageOutput {
            buffer: AudioBuffer::new(input.sample_rate, input.channels, samples),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ParamValue;
    use std::collections::HashMap;

    fn params(target_db: f64, mode: &str) -> StageParams {
        let mut values = HashMap::new();
        values.insert("target_db".to_string(), ParamValue::Float(target_db));
        values.insert("mode".to_string(), ParamValue::Str(mode.to_string()));
        StageParams::new(values)
    }

    #[test]
    fn test_peak_normalization_exact() {
        let input = AudioBuffer::new(44100, 2, vec![0.25, -0.5, 0.1, 0.05]);
        let output = GainNormalize
            .transform(&input, &params(-3.0, "peak"))
            .unwrap();

        let expected_peak = db_to_linear(-3.0);
        assert!((output.buffer.peak() - expected_peak).abs() < 1e-6);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_rms_normalization() {
        let input = AudioBuffer::new(44100, 1, vec![0.1; 1000]);
        let output = GainNormalize
            .transform(&input, &params(-20.0, "rms"))
            .unwrap();

        let expected = db_to_linear(-20.0);
        assert!((output.buffer.rms() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_rms_clipping_warns() {
        // One outlier sample forces clipping when RMS is pushed up
        let mut samples = vec![0.01f32; 1000];
        samples[0] = 0.9;
        let input = AudioBuffer::new(44100, 1, samples);
        let output = GainNormalize
            .transform(&input, &params(-6.0, "rms"))
            .unwrap();

        assert!(output.buffer.peak() <= 1.0);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_silent_buffer_untouched() {
        let input = AudioBuffer::new(44100, 1, vec![0.0; 100]);
        let output = GainNormalize
            .transform(&input, &params(-3.0, "peak"))
            .unwrap();
        assert_eq!(output.buffer, input);
        assert_eq!(output.warnings.len(), 1);
    }
}
