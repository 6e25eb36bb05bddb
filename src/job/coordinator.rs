//! Job coordinator
//!
//! Owns every job's lifecycle and the bounded worker pool that runs them.
//! Admission is FIFO with a hard backlog limit, which is the service's
//! backpressure against unbounded simultaneous uploads. Each job runs on
//! exactly one worker thread and owns its buffer chain exclusively, so the
//! hot path needs no locking; only the queue and the job table are shared.

use crate::audio::{decoder, encoder, resampler, AudioBuffer, OutputFormat};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::job::{JobSnapshot, JobState, OutputStatus};
use crate::pipeline::executor::{self, RunControl};
use crate::pipeline::{OutputRequest, PipelineSpec, StageDiagnostic};
use crate::stage::format_tag::TAGGED_OUTPUT_PREFIX;
use crate::stage::registry::ResolvedPipeline;
use crate::stage::{ParamValue, StageRegistry};
use crate::store::{Artifact, ArtifactStore};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One processing request as accepted by [`JobCoordinator::submit`]
pub struct SubmitRequest {
    /// Raw uploaded audio payload
    pub bytes: Vec<u8>,

    /// Optional content-type hint forwarded to the decoder probe
    pub mime_type: Option<String>,

    /// Ordered stage invocations
    pub spec: PipelineSpec,

    /// Requested outputs; empty means one "default" WAV output
    pub outputs: Vec<OutputRequest>,

    /// Wall-clock budget override; None falls back to the configured default
    pub timeout: Option<Duration>,
}

/// Input data a worker consumes when the job starts running
struct JobPayload {
    bytes: Vec<u8>,
    mime_type: Option<String>,
    pipeline: ResolvedPipeline,
}

/// One job's full record. Mutated only by the coordinator and its workers.
struct Job {
    id: Uuid,
    created_at: chrono::DateTime<Utc>,
    state: JobState,
    pipeline_names: Vec<String>,
    diagnostics: Vec<StageDiagnostic>,
    outputs: Vec<OutputStatus>,
    error: Option<String>,
    cancel: Arc<AtomicBool>,
    timeout: Option<Duration>,
    payload: Option<JobPayload>,
}

impl Job {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            state: self.state.label(),
            stage: self.state.stage_index(),
            created_at: self.created_at,
            pipeline: self.pipeline_names.clone(),
            diagnostics: self.diagnostics.clone(),
            outputs: self.outputs.clone(),
            error: self.error.clone(),
        }
    }
}

/// State shared between the coordinator handle and its worker threads
struct Shared {
    jobs: Mutex<HashMap<Uuid, Job>>,

    /// FIFO admission queue of job ids waiting for a free slot
    queue: Mutex<VecDeque<Uuid>>,

    /// Wakes idle workers on submit and shutdown
    condvar: Condvar,

    /// Shutdown flag for the worker pool
    stop: AtomicBool,

    registry: Arc<StageRegistry>,
    store: Arc<dyn ArtifactStore>,
    canonical_sample_rate: u32,
    queue_backlog: usize,
    default_timeout: Option<Duration>,
}

/// Bounded-concurrency job runner
pub struct JobCoordinator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobCoordinator {
    /// Create the coordinator and spawn its worker pool
    pub fn new(
        config: &Config,
        registry: Arc<StageRegistry>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            stop: AtomicBool::new(false),
            registry,
            store,
            canonical_sample_rate: config.canonical_sample_rate,
            queue_backlog: config.queue_backlog,
            default_timeout: config.default_timeout_ms.map(Duration::from_millis),
        });

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let shared_clone = Arc::clone(&shared);
            workers.push(thread::spawn(move || worker_loop(worker_id, shared_clone)));
        }

        info!("Job coordinator started with {} worker slots", worker_count);

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Submit a new job.
    ///
    /// The pipeline spec is validated synchronously; a validation failure
    /// never creates a job. A full backlog is rejected with
    /// `CapacityExceeded` before any state is allocated.
    pub fn submit(&self, request: SubmitRequest) -> Result<Uuid> {
        let pipeline = self.shared.registry.validate(&request.spec)?;
        let outputs = collect_outputs(&request)?;

        let id = Uuid::new_v4();
        let job = Job {
            id,
            created_at: Utc::now(),
            state: JobState::Queued,
            pipeline_names: request.spec.stage_names(),
            diagnostics: Vec::new(),
            outputs,
            error: None,
            cancel: Arc::new(AtomicBool::new(false)),
            timeout: request.timeout.or(self.shared.default_timeout),
            payload: Some(JobPayload {
                bytes: request.bytes,
                mime_type: request.mime_type,
                pipeline,
            }),
        };

        {
            // Hold the queue lock across the capacity check and insert so
            // concurrent submissions cannot overshoot the backlog
            let mut queue = self.shared.queue.lock().unwrap();
            if queue.len() >= self.shared.queue_backlog {
                warn!("Rejecting submission: queue backlog full ({})", queue.len());
                return Err(Error::CapacityExceeded);
            }
            self.shared.jobs.lock().unwrap().insert(id, job);
            queue.push_back(id);
        }
        self.shared.condvar.notify_one();

        info!("Job {} submitted", id);
        Ok(id)
    }

    /// Current snapshot of a job
    pub fn status(&self, id: Uuid) -> Result<JobSnapshot> {
        self.shared
            .jobs
            .lock()
            .unwrap()
            .get(&id)
            .map(Job::snapshot)
            .ok_or(Error::UnknownJob(id))
    }

    /// Request cancellation.
    ///
    /// A queued job transitions to Cancelled immediately; a running job's
    /// flag is observed at the next stage boundary. Terminal jobs report
    /// `AlreadyTerminal`, which the API treats as a non-fatal status.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.shared.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;

        if job.state.is_terminal() {
            return Err(Error::AlreadyTerminal(id));
        }

        job.cancel.store(true, Ordering::Relaxed);
        if job.state == JobState::Queued {
            job.state = JobState::Cancelled;
            job.payload = None;
            info!("Job {} cancelled before start", id);
        } else {
            info!("Job {} cancellation requested", id);
        }
        Ok(())
    }

    /// Fetch one named artifact of a succeeded job
    pub fn artifact(&self, id: Uuid, name: &str) -> Result<Artifact> {
        let state = {
            let jobs = self.shared.jobs.lock().unwrap();
            jobs.get(&id).map(|j| j.state).ok_or(Error::UnknownJob(id))?
        };

        if state != JobState::Succeeded {
            return Err(Error::ArtifactNotAvailable(format!(
                "job {} is {}",
                id,
                state.label()
            )));
        }

        let artifacts = self
            .shared
            .store
            .get(id)
            .ok_or_else(|| Error::ArtifactNotAvailable(format!("job {} evicted", id)))?;

        artifacts
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::ArtifactNotAvailable(format!("no output named '{}'", name)))
    }

    /// Stop the worker pool. Running jobs stop at their next stage boundary.
    pub fn shutdown(&self) {
        if self.shared.stop.swap(true, Ordering::Relaxed) {
            return;
        }
        {
            let jobs = self.shared.jobs.lock().unwrap();
            for job in jobs.values() {
                if !job.state.is_terminal() {
                    job.cancel.store(true, Ordering::Relaxed);
                }
            }
        }
        self.shared.condvar.notify_all();
        for handle in self.workers.lock().unwrap().drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked during shutdown");
            }
        }
        info!("Job coordinator stopped");
    }
}

impl Drop for JobCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Expand the requested outputs: default output when none given, plus one
/// output per format-tag stage in the spec. Formats are checked here so an
/// unsupported target fails at submission rather than after minutes of work.
fn collect_outputs(request: &SubmitRequest) -> Result<Vec<OutputStatus>> {
    let mut requested = request.outputs.clone();
    if requested.is_empty() {
        requested.push(OutputRequest::new("default", "wav"));
    }

    for invocation in &request.spec.stages {
        if invocation.stage != "format-tag" {
            continue;
        }
        if let Some(ParamValue::Str(format)) = invocation.params.get("format") {
            let name = format!("{}{}", TAGGED_OUTPUT_PREFIX, format);
            if !requested.iter().any(|o| o.name == name) {
                requested.push(OutputRequest::new(name, format.clone()));
            }
        }
    }

    let mut outputs: Vec<OutputStatus> = Vec::with_capacity(requested.len());
    for output in requested {
        OutputFormat::parse(&output.format)?;
        // First request wins on a name collision
        if !outputs.iter().any(|o| o.name == output.name) {
            outputs.push(OutputStatus::pending(output.name, output.format));
        }
    }

    Ok(outputs)
}

/// Worker thread main loop: pop the next admitted job, run it to a terminal
/// state, repeat until shutdown.
fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    debug!("Worker {} started", worker_id);

    loop {
        let id = {
            let mut queue = shared.queue.lock().unwrap();
            while queue.is_empty() && !shared.stop.load(Ordering::Relaxed) {
                queue = shared.condvar.wait(queue).unwrap();
            }
            if shared.stop.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", worker_id);
                break;
            }
            match queue.pop_front() {
                Some(id) => id,
                None => continue,
            }
        };

        debug!("Worker {} picked up job {}", worker_id, id);
        run_job(&shared, id);
    }

    debug!("Worker {} exiting", worker_id);
}

/// Drive one job from Decoding to a terminal state
fn run_job(shared: &Shared, id: Uuid) {
    // Claim the payload; a job cancelled while queued is already terminal
    let (payload, control) = {
        let mut jobs = shared.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&id) else {
            return;
        };
        if job.state.is_terminal() {
            return;
        }

        job.state = JobState::Decoding;
        let control = RunControl {
            cancel: Arc::clone(&job.cancel),
            deadline: job.timeout.map(|t| Instant::now() + t),
        };
        (job.payload.take(), control)
    };

    let Some(payload) = payload else {
        finish(shared, id, JobState::Failed, Some("job payload missing".to_string()));
        return;
    };

    let decoded = match decoder::decode(&payload.bytes, payload.mime_type.as_deref()) {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!("Job {} decode failed: {}", id, e);
            finish(shared, id, JobState::Failed, Some(e.to_string()));
            return;
        }
    };

    // Normalize to the canonical rate unless the spec starts with an
    // explicit resample stage, which then owns the conversion
    let first_is_resample = payload.pipeline.first_stage_name() == Some("resample");
    let buffer = if first_is_resample || decoded.sample_rate == shared.canonical_sample_rate {
        decoded
    } else {
        let channels = decoded.channels;
        match resampler::resample(
            &decoded.samples,
            decoded.sample_rate,
            shared.canonical_sample_rate,
            channels,
        ) {
            Ok(samples) => AudioBuffer::new(shared.canonical_sample_rate, channels, samples),
            Err(e) => {
                warn!("Job {} canonical resample failed: {}", id, e);
                finish(shared, id, JobState::Failed, Some(e.to_string()));
                return;
            }
        }
    };

    if let Some(e) = control.interrupted() {
        finish_interrupted(shared, id, e);
        return;
    }

    let report = executor::run(buffer, &payload.pipeline, &control, |index, name| {
        debug!("Job {} entering stage {} ({})", id, index, name);
        if let Some(job) = shared.jobs.lock().unwrap().get_mut(&id) {
            job.state = JobState::Running(index);
        }
    });

    {
        let mut jobs = shared.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&id) {
            job.diagnostics = report.diagnostics;
        }
    }

    let final_buffer = match report.result {
        Ok(buffer) => buffer,
        Err(e @ (Error::Cancelled | Error::Timeout)) => {
            finish_interrupted(shared, id, e);
            return;
        }
        Err(e) => {
            warn!("Job {} pipeline failed: {}", id, e);
            finish(shared, id, JobState::Failed, Some(e.to_string()));
            return;
        }
    };

    {
        let mut jobs = shared.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&id) {
            job.state = JobState::Encoding;
        }
    }

    if let Some(e) = control.interrupted() {
        finish_interrupted(shared, id, e);
        return;
    }

    encode_outputs(shared, id, &final_buffer, &control);
}

/// Encode every requested output independently, then settle the job.
/// One failed output never discards its siblings; the job only fails when
/// nothing could be encoded. Interruption is re-checked before artifacts
/// are stored: a cancel raised during encoding never exposes outputs.
fn encode_outputs(shared: &Shared, id: Uuid, buffer: &AudioBuffer, control: &RunControl) {
    let requested: Vec<(String, String)> = {
        let jobs = shared.jobs.lock().unwrap();
        match jobs.get(&id) {
            Some(job) => job
                .outputs
                .iter()
                .map(|o| (o.name.clone(), o.format.clone()))
                .collect(),
            None => return,
        }
    };

    let mut artifacts = Vec::new();
    let mut results: Vec<(String, std::result::Result<(String, usize), String>)> = Vec::new();
    let mut first_error: Option<String> = None;

    for (name, format) in requested {
        let encoded = OutputFormat::parse(&format).and_then(|f| encoder::encode(buffer, f));
        match encoded {
            Ok(encoded) => {
                results.push((
                    name.clone(),
                    Ok((encoded.content_type.to_string(), encoded.bytes.len())),
                ));
                artifacts.push(Artifact {
                    name,
                    content_type: encoded.content_type.to_string(),
                    bytes: encoded.bytes,
                });
            }
            Err(e) => {
                warn!("Job {} output '{}' encode failed: {}", id, name, e);
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
                results.push((name, Err(e.to_string())));
            }
        }
    }

    if let Some(e) = control.interrupted() {
        finish_interrupted(shared, id, e);
        return;
    }

    let succeeded = !artifacts.is_empty();
    if succeeded {
        shared.store.put(id, artifacts);
    }

    let mut jobs = shared.jobs.lock().unwrap();
    let Some(job) = jobs.get_mut(&id) else {
        return;
    };

    for (name, result) in results {
        if let Some(status) = job.outputs.iter_mut().find(|o| o.name == name) {
            match result {
                Ok((content_type, size_bytes)) => {
                    status.content_type = Some(content_type);
                    status.size_bytes = Some(size_bytes);
                }
                Err(message) => status.error = Some(message),
            }
        }
    }

    if succeeded {
        job.state = JobState::Succeeded;
        info!("Job {} succeeded", id);
    } else {
        job.state = JobState::Failed;
        job.error = first_error.or_else(|| Some("no outputs produced".to_string()));
        warn!("Job {} failed: no outputs produced", id);
    }
}

/// Settle a cancelled or timed-out job. Timeouts fail the job with the
/// budget error; cancellations land in the Cancelled state. Neither exposes
/// artifacts.
fn finish_interrupted(shared: &Shared, id: Uuid, err: Error) {
    match err {
        Error::Cancelled => {
            info!("Job {} cancelled", id);
            finish(shared, id, JobState::Cancelled, None);
        }
        _ => {
            warn!("Job {} timed out", id);
            finish(shared, id, JobState::Failed, Some(Error::Timeout.to_string()));
        }
    }
}

fn finish(shared: &Shared, id: Uuid, state: JobState, error: Option<String>) {
    let mut jobs = shared.jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&id) {
        job.state = state;
        job.error = error;
        job.payload = None;
    }
}
