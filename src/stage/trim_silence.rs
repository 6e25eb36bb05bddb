//! Trim-silence stage
//!
//! Strips leading and trailing silence. A frame counts as silent when its
//! peak falls below the threshold; a run is only removed when it lasts at
//! least the minimum duration, so short quiet intros survive.

use crate::audio::AudioBuffer;
use crate::error::Result;
use crate::stage::{db_to_linear, ParamSpec, Stage, StageDefinition, StageOutput, StageParams};

pub struct TrimSilence;

impl Stage for TrimSilence {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "trim-silence",
            params: vec![
                ParamSpec::float("threshold_db", -60.0, -120.0, 0.0),
                ParamSpec::int("min_silence_ms", 100, 0, 60000),
            ],
        }
    }

    fn transform(&self, input: &AudioBuffer, params: &StageParams) -> Result<StageOutput> {
        let threshold = db_to_linear(params.float("threshold_db")?);
        let min_silence_ms = params.int("min_silence_ms")? as u64;
        let min_frames = (min_silence_ms * input.sample_rate as u64 / 1000) as usize;

        let total_frames = input.frames();
        let leading = (0..total_frames)
            .take_while(|i| input.frame_peak(*i) < threshold)
            .count();

        if leading == total_frames {
            // Entire buffer below threshold: pass through rather than
            // producing an empty buffer
            return Ok(StageOutput {
                buffer: input.clone(),
                warnings: vec!["entire buffer below silence threshold, not trimmed".to_string()],
            });
        }

        let trailing = (0..total_frames)
            .rev()
            .take_while(|i| input.frame_peak(*i) < threshold)
            .count();

        let start = if leading >= min_frames { leading } else { 0 };
        let end = if trailing >= min_frames {
            total_frames - trailing
        } else {
            total_frames
        };

        let channels = input.channels as usize;
        let samples = input.samples[start * channels..end * channels].to_vec();

        Ok(AudioBuffer::new(input.sample_rate, input.channels, samples).into())
    }
}
