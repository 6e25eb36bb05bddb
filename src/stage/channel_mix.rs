//! Channel-mix stage
//!
//! Mono/stereo conversion. Downmix averages all source channels; upmix
//! duplicates a mono channel. Already-matching layouts pass through
//! untouched.

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use crate::stage::{ParamSpec, Stage, StageDefinition, StageOutput, StageParams};

pub struct ChannelMix;

impl Stage for ChannelMix {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "channel-mix",
            params: vec![ParamSpec::required_choice(
                "mode",
                &["to_mono", "to_stereo"],
            )],
        }
    }

    fn transform(&self, input: &AudioBuffer, params: &StageParams) -> Result<StageOutput> {
        let mode = params.str("mode")?;

        match mode {
            "to_mono" => {
                if input.channels == 1 {
                    return Ok(input.clone().into());
                }
                let channels = input.channels as usize;
                let samples: Vec<f32> = input
                    .samples
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                    .collect();
                Ok(AudioBuffer::new(input.sample_rate, 1, samples).into())
            }
            "to_stereo" => match input.channels {
                2 => Ok(input.clone().into()),
                1 => {
                    let samples: Vec<f32> =
                        input.samples.iter().flat_map(|s| [*s, *s]).collect();
                    Ok(AudioBuffer::new(input.sample_rate, 2, samples).into())
                }
                n => Err(Error::StageFailed {
                    stage: "channel-mix".to_string(),
                    message: format!("cannot upmix {} channels to stereo", n),
                }),
            },
            other => Err(Error::StageFailed {
                stage: "channel-mix".to_string(),
                message: format!("unsupported mode '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ParamValue;
    use std::collections::HashMap;

    fn params(mode: &str) -> StageParams {
        let mut values = HashMap::new();
        values.insert("mode".to_string(), ParamValue::Str(mode.to_string()));
        StageParams::new(values)
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let input = AudioBuffer::new(44100, 2, vec![0.2, 0.4, -0.6, -0.2]);
        let output = ChannelMix.transform(&input, &params("to_mono")).unwrap();
        assert_eq!(output.buffer.channels, 1);
        assert!((output.buffer.samples[0] - 0.3).abs() < 1e-6);
        assert!((output.buffer.samples[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let input = AudioBuffer::new(44100, 1, vec![0.1, 0.2]);
        let output = ChannelMix.transform(&input, &params("to_stereo")).unwrap();
        assert_eq!(output.buffer.channels, 2);
        assert_eq!(output.buffer.samples, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_matching_layout_passthrough() {
        let input = AudioBuffer::new(44100, 1, vec![0.1, 0.2]);
        let output = ChannelMix.transform(&input, &params("to_mono")).unwrap();
        assert_eq!(output.buffer, input);
    }

    #[test]
    fn test_multichannel_upmix_fails() {
        let input = AudioBuffer::new(44100, 4, vec![0.1; 8]);
        let err = ChannelMix
            .transform(&input, &params("to_stereo"))
            .unwrap_err();
        assert!(matches!(err, Error::StageFailed { stage, .. } if stage == "channel-mix"));
    }

    #[test]
    fn test_quad_downmix() {
        let input = AudioBuffer::new(44100, 4, vec![0.4, 0.0, 0.4, 0.0]);
        let output = ChannelMix.transform(&input, &params("to_mono")).unwrap();
        assert_eq!(output.buffer.channels, 1);
        assert!((output.buffer.samples[0] - 0.2).abs() < 1e-6);
    }
}
