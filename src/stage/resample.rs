//! Resample stage
//!
//! Converts the buffer to a caller-chosen sample rate using the shared
//! rubato helper. When the pipeline starts with this stage, decoding skips
//! its own canonical-rate normalization and lets this stage do the work at
//! the source's native rate.

use crate::audio::{resampler, AudioBuffer};
use crate::error::Result;
use crate::stage::{ParamSpec, Stage, StageDefinition, StageOutput, StageParams};

pub struct Resample;

impl Stage for Resample {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "resample",
            params: vec![ParamSpec::required_int("target_rate", 4000, 192000)],
        }
    }

    fn transform(&self, input: &AudioBuffer, params: &StageParams) -> Result<StageOutput> {
        let target_rate = params.int("target_rate")? as u32;

        let samples = resampler::resample(
            &input.samples,
            input.sample_rate,
            target_rate,
            input.channels,
        )?;

        Ok(AudioBuffer::new(target_rate, input.channels, samples).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params(rate: i64) -> StageParams {
        let mut values = HashMap::new();
        values.insert(
            "target_rate".to_string(),
            crate::stage::ParamValue::Int(rate),
        );
        StageParams::new(values)
    }

    #[test]
    fn test_changes_rate() {
        let input = AudioBuffer::new(
            44100,
            2,
            (0..44100 * 2).map(|i| ((i as f32) * 0.001).sin() * 0.3).collect(),
        );
        let output = Resample.transform(&input, &params(16000)).unwrap();

        assert_eq!(output.buffer.sample_rate, 16000);
        assert_eq!(output.buffer.channels, 2);
        let expected = (input.frames() as f64 * 16000.0 / 44100.0) as usize;
        assert!(output.buffer.frames().abs_diff(expected) <= 10);
    }

    #[test]
    fn test_identity_at_target_rate() {
        let input = AudioBuffer::new(16000, 1, vec![0.1, 0.2, 0.3, 0.4]);
        let output = Resample.transform(&input, &params(16000)).unwrap();
        assert_eq!(output.buffer, input);
    }
}
