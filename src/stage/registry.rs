//! Stage registry
//!
//! Catalog of named stages with their parameter schemas. Built once at
//! startup, wrapped in an Arc, and read-only thereafter, so the execution
//! hot path never takes a lock. Validation is total: a pipeline spec is
//! checked in full before any stage runs.

use crate::error::{Error, Result, ValidationReason};
use crate::pipeline::spec::PipelineSpec;
use crate::stage::{
    channel_mix::ChannelMix, format_tag::FormatTag, gain_normalize::GainNormalize,
    resample::Resample, trim_silence::TrimSilence, ParamKind, ParamSpec, ParamValue, Stage,
    StageParams,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A spec entry resolved against the registry: the stage implementation plus
/// validated, default-filled parameters.
#[derive(Clone)]
pub struct ResolvedStage {
    pub name: String,
    pub stage: Arc<dyn Stage>,
    pub params: StageParams,
}

impl std::fmt::Debug for ResolvedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedStage")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A fully validated pipeline ready for execution
#[derive(Clone, Debug, Default)]
pub struct ResolvedPipeline {
    pub stages: Vec<ResolvedStage>,
}

impl ResolvedPipeline {
    pub fn first_stage_name(&self) -> Option<&str> {
        self.stages.first().map(|s| s.name.as_str())
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }
}

/// Catalog of named transformation stages
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Empty registry (tests register their own stages)
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in stages
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for stage in [
            Arc::new(Resample) as Arc<dyn Stage>,
            Arc::new(TrimSilence) as Arc<dyn Stage>,
            Arc::new(GainNormalize) as Arc<dyn Stage>,
            Arc::new(ChannelMix) as Arc<dyn Stage>,
            Arc::new(FormatTag) as Arc<dyn Stage>,
        ] {
            // Built-in names are unique by construction
            let name = stage.definition().name;
            registry.stages.insert(name.to_string(), stage);
        }

        info!("Stage registry initialized with {} stages", registry.stages.len());
        registry
    }

    /// Register a stage. Fails when the name is already taken.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.definition().name;
        if self.stages.contains_key(name) {
            return Err(Error::DuplicateStage(name.to_string()));
        }
        self.stages.insert(name.to_string(), stage);
        Ok(())
    }

    /// Look up a stage by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Stage>> {
        self.stages.get(name).cloned().ok_or_else(|| Error::Validation {
            stage: name.to_string(),
            field: None,
            reason: ValidationReason::UnknownStage,
        })
    }

    /// Validate a pipeline spec against the registry.
    ///
    /// Checks, per stage: existence, no unknown parameter names, required
    /// parameter presence, type conformance (Int accepted where Float is
    /// declared), and range/choice conformance. Returns the resolved
    /// pipeline with defaults filled so execution never re-checks.
    pub fn validate(&self, spec: &PipelineSpec) -> Result<ResolvedPipeline> {
        let mut resolved = Vec::with_capacity(spec.stages.len());

        for invocation in &spec.stages {
            let stage = self.resolve(&invocation.stage)?;
            let definition = stage.definition();

            // Reject parameters the stage does not declare
            for key in invocation.params.keys() {
                if !definition.params.iter().any(|p| p.name == key) {
                    return Err(Error::Validation {
                        stage: invocation.stage.clone(),
                        field: Some(key.clone()),
                        reason: ValidationReason::UnknownParameter,
                    });
                }
            }

            let mut values = HashMap::new();
            for param in &definition.params {
                let provided = invocation.params.get(param.name);
                let value = match (provided, &param.default) {
                    (Some(value), _) => {
                        check_value(&invocation.stage, param, value)?;
                        coerce(param, value.clone())
                    }
                    (None, Some(default)) => default.clone(),
                    (None, None) => {
                        debug_assert!(param.required);
                        return Err(Error::Validation {
                            stage: invocation.stage.clone(),
                            field: Some(param.name.to_string()),
                            reason: ValidationReason::MissingParameter,
                        });
                    }
                };
                values.insert(param.name.to_string(), value);
            }

            resolved.push(ResolvedStage {
                name: invocation.stage.clone(),
                stage,
                params: StageParams::new(values),
            });
        }

        Ok(ResolvedPipeline { stages: resolved })
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Type, range, and choice conformance for one provided value
fn check_value(stage: &str, param: &ParamSpec, value: &ParamValue) -> Result<()> {
    let invalid = || Error::Validation {
        stage: stage.to_string(),
        field: Some(param.name.to_string()),
        reason: ValidationReason::InvalidParameterValue,
    };

    let type_ok = match param.kind {
        ParamKind::Int => value.kind() == ParamKind::Int,
        // An integer literal is a valid float parameter
        ParamKind::Float => matches!(value.kind(), ParamKind::Int | ParamKind::Float),
        ParamKind::Str => value.kind() == ParamKind::Str,
        ParamKind::Bool => value.kind() == ParamKind::Bool,
    };
    if !type_ok {
        return Err(invalid());
    }

    if let Some(number) = value.as_number() {
        if let Some(min) = param.min {
            if number < min {
                return Err(invalid());
            }
        }
        if let Some(max) = param.max {
            if number > max {
                return Err(invalid());
            }
        }
    }

    if !param.choices.is_empty() {
        if let ParamValue::Str(s) = value {
            if !param.choices.contains(&s.as_str()) {
                return Err(invalid());
            }
        }
    }

    Ok(())
}

/// Widen an integer literal where the schema declares a float
fn coerce(param: &ParamSpec, value: ParamValue) -> ParamValue {
    match (param.kind, &value) {
        (ParamKind::Float, ParamValue::Int(v)) => ParamValue::Float(*v as f64),
        _ => value,
    }
}
