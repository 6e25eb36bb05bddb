//! Format-tag stage
//!
//! Pass-through marker consumed by the encoder side: the job coordinator
//! reads the tag from the validated spec at submission time and adds a
//! matching output request. At run time the buffer flows through unchanged,
//! which keeps the executor contract uniform.

use crate::audio::AudioBuffer;
use crate::error::Result;
use crate::stage::{ParamSpec, Stage, StageDefinition, StageOutput, StageParams};

/// Output name prefix for artifacts requested through a format-tag stage
pub const TAGGED_OUTPUT_PREFIX: &str = "tagged-";

pub struct FormatTag;

impl Stage for FormatTag {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "format-tag",
            params: vec![ParamSpec::required_choice(
                "format",
                &["wav", "wav-float", "mp3"],
            )],
        }
    }

    fn transform(&self, input: &AudioBuffer, _params: &StageParams) -> Result<StageOutput> {
        Ok(input.clone().into())
    }
}
