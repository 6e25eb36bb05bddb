//! Pipeline spec wire types
//!
//! The structured request body a caller submits alongside the audio payload:
//! an ordered list of stage invocations plus the outputs to render from the
//! final buffer.

use crate::stage::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stage call in a pipeline: the stage name plus its parameter mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInvocation {
    pub stage: String,

    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl StageInvocation {
    /// Invocation with no parameters (defaults apply)
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add one parameter
    pub fn with_param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// Ordered sequence of stage invocations, validated against the registry
/// before any execution starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineSpec {
    pub stages: Vec<StageInvocation>,
}

impl PipelineSpec {
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.stage.clone()).collect()
    }
}

/// One requested output artifact: a caller-chosen name plus a target format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputRequest {
    pub name: String,
    pub format: String,
}

impl OutputRequest {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
        }
    }
}
