//! Transformation stages
//!
//! A stage is a named, parameterized, deterministic audio transform:
//! `AudioBuffer x parameters -> AudioBuffer`. Stages declare a parameter
//! schema the registry validates against before any execution starts, so a
//! running stage can rely on its parameters being present and type-correct.

pub mod channel_mix;
pub mod format_tag;
pub mod gain_normalize;
pub mod registry;
pub mod resample;
pub mod trim_silence;

pub use registry::StageRegistry;

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared type of a stage parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Str,
    Bool,
}

/// A parameter value as carried in a pipeline spec.
///
/// JSON numbers without a fractional part deserialize as `Int`; validation
/// widens them where a stage declares `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }

    /// Numeric view used for range checks (Int widens to f64)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Schema entry for one stage parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamValue>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: &'static [&'static str],
}

impl ParamSpec {
    /// Required integer parameter with an inclusive range
    pub fn required_int(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            required: true,
            default: None,
            min: Some(min as f64),
            max: Some(max as f64),
            choices: &[],
        }
    }

    /// Optional integer parameter with a default and an inclusive range
    pub fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            required: false,
            default: Some(ParamValue::Int(default)),
            min: Some(min as f64),
            max: Some(max as f64),
            choices: &[],
        }
    }

    /// Optional float parameter with a default and an inclusive range
    pub fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            required: false,
            default: Some(ParamValue::Float(default)),
            min: Some(min),
            max: Some(max),
            choices: &[],
        }
    }

    /// Optional string parameter restricted to a fixed set of choices
    pub fn choice(
        name: &'static str,
        default: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Str,
            required: false,
            default: Some(ParamValue::Str(default.to_string())),
            min: None,
            max: None,
            choices,
        }
    }

    /// Required string parameter restricted to a fixed set of choices
    pub fn required_choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: ParamKind::Str,
            required: true,
            default: None,
            min: None,
            max: None,
            choices,
        }
    }
}

/// Name plus parameter schema of a registered stage
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub name: &'static str,
    pub params: Vec<ParamSpec>,
}

/// Validated, default-filled parameters handed to a stage transform
#[derive(Debug, Clone, Default)]
pub struct StageParams {
    values: HashMap<String, ParamValue>,
}

impl StageParams {
    pub fn new(values: HashMap<String, ParamValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Integer parameter; present and type-correct after validation
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            _ => Err(Error::Internal(format!(
                "parameter '{}' missing after validation",
                name
            ))),
        }
    }

    /// Float parameter; integers provided by the caller were widened during validation
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            _ => Err(Error::Internal(format!(
                "parameter '{}' missing after validation",
                name
            ))),
        }
    }

    /// String parameter
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(v)) => Ok(v),
            _ => Err(Error::Internal(format!(
                "parameter '{}' missing after validation",
                name
            ))),
        }
    }
}

/// Result of one stage transform: the new buffer plus non-fatal warnings
/// that land in the job's diagnostic log.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub buffer: AudioBuffer,
    pub warnings: Vec<String>,
}

impl From<AudioBuffer> for StageOutput {
    fn from(buffer: AudioBuffer) -> Self {
        Self {
            buffer,
            warnings: Vec::new(),
        }
    }
}

/// One audio transformation behind the registry.
///
/// Implementations must be deterministic: no wall-clock reads, no unseeded
/// randomness, no external mutable state. Identical (buffer, params) pairs
/// must produce byte-identical output.
pub trait Stage: Send + Sync {
    /// Name and parameter schema used for registration and validation
    fn definition(&self) -> StageDefinition;

    /// Apply the transform, producing a new buffer
    fn transform(&self, input: &AudioBuffer, params: &StageParams) -> Result<StageOutput>;
}

/// Convert a decibel value to a linear amplitude factor
pub(crate) fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}
