//! Pipeline executor
//!
//! Runs a validated pipeline strictly in declared order, threading each
//! stage's output buffer into the next. Fail-fast: the first stage failure
//! aborts the rest of the run, with the diagnostics gathered so far always
//! retained. Cancellation and the wall-clock deadline are checked between
//! stages, never mid-transform.

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use crate::stage::registry::ResolvedPipeline;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Cooperative interruption state for one run
#[derive(Clone, Default)]
pub struct RunControl {
    /// Set by the coordinator on explicit cancellation
    pub cancel: Arc<AtomicBool>,

    /// Wall-clock budget expiry, when the job carries one
    pub deadline: Option<Instant>,
}

impl RunControl {
    /// Returns the interruption error to report, if any. Cancellation wins
    /// over timeout when both apply.
    pub fn interrupted(&self) -> Option<Error> {
        if self.cancel.load(Ordering::Relaxed) {
            return Some(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Error::Timeout);
            }
        }
        None
    }
}

/// Diagnostic record for one completed stage invocation
#[derive(Debug, Clone, Serialize)]
pub struct StageDiagnostic {
    pub stage: String,
    pub duration_ms: u64,
    pub input_frames: usize,
    pub output_frames: usize,
    pub warnings: Vec<String>,
}

/// Outcome of a pipeline run. Diagnostics cover every stage that completed,
/// in declared order, whether or not the run succeeded.
pub struct ExecutionReport {
    pub diagnostics: Vec<StageDiagnostic>,
    pub result: Result<AudioBuffer>,
}

/// Execute all stages of a resolved pipeline.
///
/// `on_stage` is invoked with (index, name) before each stage starts so the
/// caller can publish progress.
pub fn run(
    input: AudioBuffer,
    pipeline: &ResolvedPipeline,
    control: &RunControl,
    mut on_stage: impl FnMut(usize, &str),
) -> ExecutionReport {
    let mut diagnostics = Vec::with_capacity(pipeline.stages.len());
    let mut buffer = input;

    for (index, resolved) in pipeline.stages.iter().enumerate() {
        if let Some(err) = control.interrupted() {
            debug!("Pipeline interrupted before stage {}: {}", index, err);
            return ExecutionReport {
                diagnostics,
                result: Err(err),
            };
        }

        on_stage(index, &resolved.name);
        let input_frames = buffer.frames();
        let started = Instant::now();

        let output = match resolved.stage.transform(&buffer, &resolved.params) {
            Ok(output) => output,
            Err(e) => {
                warn!("Stage '{}' failed: {}", resolved.name, e);
                return ExecutionReport {
                    diagnostics,
                    result: Err(e),
                };
            }
        };

        // Basic sanity: never propagate corrupt audio downstream
        if let Err(e) = check_output(&resolved.name, &output.buffer) {
            warn!("Stage '{}' produced invalid output", resolved.name);
            return ExecutionReport {
                diagnostics,
                result: Err(e),
            };
        }

        let diagnostic = StageDiagnostic {
            stage: resolved.name.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            input_frames,
            output_frames: output.buffer.frames(),
            warnings: output.warnings,
        };
        debug!(
            "Stage '{}' completed: {} -> {} frames in {}ms",
            diagnostic.stage,
            diagnostic.input_frames,
            diagnostic.output_frames,
            diagnostic.duration_ms
        );
        diagnostics.push(diagnostic);

        buffer = output.buffer;
    }

    ExecutionReport {
        diagnostics,
        result: Ok(buffer),
    }
}

/// Non-empty, frame-aligned, finite
fn check_output(stage: &str, buffer: &AudioBuffer) -> Result<()> {
    if buffer.samples.is_empty()
        || buffer.samples.len() % buffer.channels.max(1) as usize != 0
        || !buffer.is_finite()
    {
        return Err(Error::StageNumeric {
            stage: stage.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::spec::PipelineSpec;
    use crate::stage::{
        ParamSpec, Stage, StageDefinition, StageOutput, StageParams, StageRegistry,
    };
    use serde_json::json;

    fn pipeline(registry: &StageRegistry, spec: serde_json::Value) -> ResolvedPipeline {
        let spec: PipelineSpec = serde_json::from_value(spec).unwrap();
        registry.validate(&spec).unwrap()
    }

    fn tone(frames: usize) -> AudioBuffer {
        let samples: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / 44100.0;
                let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
                [s, s]
            })
            .collect();
        AudioBuffer::new(44100, 2, samples)
    }

    /// Test stage that always emits NaN samples
    struct Poison;

    impl Stage for Poison {
        fn definition(&self) -> StageDefinition {
            StageDefinition {
                name: "poison",
                params: vec![],
            }
        }

        fn transform(&self, input: &AudioBuffer, _params: &StageParams) -> crate::error::Result<StageOutput> {
            Ok(AudioBuffer::new(
                input.sample_rate,
                input.channels,
                vec![f32::NAN; input.samples.len()],
            )
            .into())
        }
    }

    #[test]
    fn test_runs_stages_in_order() {
        let registry = StageRegistry::with_builtins();
        let pipeline = pipeline(
            &registry,
            json!([
                {"stage": "resample", "params": {"target_rate": 16000}},
                {"stage": "gain-normalize", "params": {"target_db": -3.0}}
            ]),
        );

        let mut seen = Vec::new();
        let report = run(tone(44100), &pipeline, &RunControl::default(), |i, name| {
            seen.push((i, name.to_string()))
        });

        let output = report.result.unwrap();
        assert_eq!(output.sample_rate, 16000);
        assert_eq!(
            seen,
            vec![(0, "resample".to_string()), (1, "gain-normalize".to_string())]
        );
        assert_eq!(report.diagnostics.len(), 2);
        assert_eq!(report.diagnostics[0].stage, "resample");
        assert_eq!(report.diagnostics[1].stage, "gain-normalize");
    }

    #[test]
    fn test_deterministic_runs() {
        let registry = StageRegistry::with_builtins();
        let pipeline = pipeline(
            &registry,
            json!([
                {"stage": "resample", "params": {"target_rate": 22050}},
                {"stage": "channel-mix", "params": {"mode": "to_mono"}},
                {"stage": "gain-normalize", "params": {"target_db": -6.0}}
            ]),
        );

        let a = run(tone(22050), &pipeline, &RunControl::default(), |_, _| {});
        let b = run(tone(22050), &pipeline, &RunControl::default(), |_, _| {});

        let buf_a = a.result.unwrap();
        let buf_b = b.result.unwrap();
        assert_eq!(buf_a.samples, buf_b.samples);

        let stages_a: Vec<&str> = a.diagnostics.iter().map(|d| d.stage.as_str()).collect();
        let stages_b: Vec<&str> = b.diagnostics.iter().map(|d| d.stage.as_str()).collect();
        assert_eq!(stages_a, stages_b);
    }

    #[test]
    fn test_fail_fast_keeps_partial_diagnostics() {
        let registry = StageRegistry::with_builtins();
        // 4-channel input: channel-mix to_stereo fails after trim-silence ran
        let pipeline = pipeline(
            &registry,
            json!([
                {"stage": "trim-silence"},
                {"stage": "channel-mix", "params": {"mode": "to_stereo"}},
                {"stage": "gain-normalize"}
            ]),
        );

        let input = AudioBuffer::new(44100, 4, vec![0.2; 44100]);
        let report = run(input, &pipeline, &RunControl::default(), |_, _| {});

        assert!(matches!(report.result, Err(Error::StageFailed { .. })));
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].stage, "trim-silence");
    }

    #[test]
    fn test_nan_output_is_numeric_error() {
        let mut registry = StageRegistry::new();
        registry.register(std::sync::Arc::new(Poison)).unwrap();
        let pipeline = pipeline(&registry, json!([{"stage": "poison"}]));

        let report = run(tone(1000), &pipeline, &RunControl::default(), |_, _| {});
        assert!(
            matches!(report.result, Err(Error::StageNumeric { stage }) if stage == "poison")
        );
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_cancel_before_first_stage() {
        let registry = StageRegistry::with_builtins();
        let pipeline = pipeline(&registry, json!([{"stage": "trim-silence"}]));

        let control = RunControl::default();
        control.cancel.store(true, Ordering::Relaxed);

        let report = run(tone(1000), &pipeline, &control, |_, _| {});
        assert!(matches!(report.result, Err(Error::Cancelled)));
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_expired_deadline_is_timeout() {
        let registry = StageRegistry::with_builtins();
        let pipeline = pipeline(&registry, json!([{"stage": "trim-silence"}]));

        let control = RunControl {
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() - std::time::Duration::from_millis(1)),
        };

        let report = run(tone(1000), &pipeline, &control, |_, _| {});
        assert!(matches!(report.result, Err(Error::Timeout)));
    }

    #[test]
    fn test_empty_pipeline_passthrough() {
        let registry = StageRegistry::with_builtins();
        let pipeline = pipeline(&registry, json!([]));

        let input = tone(100);
        let report = run(input.clone(), &pipeline, &RunControl::default(), |_, _| {});
        assert_eq!(report.result.unwrap(), input);
        assert!(report.diagnostics.is_empty());
    }
}
