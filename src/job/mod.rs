//! Job lifecycle types
//!
//! A Job is one end-to-end processing request: submitted bytes plus a
//! pipeline spec, carried through decode, stage execution, and encoding to a
//! terminal state. The coordinator is the single writer; everyone else sees
//! cloned snapshots.

pub mod coordinator;

pub use coordinator::{JobCoordinator, SubmitRequest};

use crate::pipeline::StageDiagnostic;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Job state machine.
///
/// `Queued → Decoding → Running(i) → Encoding → Succeeded`, with `Failed`
/// and `Cancelled` absorbing from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Decoding,
    Running(usize),
    Encoding,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// Wire-level state name
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Decoding => "decoding",
            JobState::Running(_) => "running",
            JobState::Encoding => "encoding",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Index of the currently running stage, when applicable
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            JobState::Running(i) => Some(*i),
            _ => None,
        }
    }
}

/// Per-output encode record: filled in as outputs are produced or fail
#[derive(Debug, Clone, Serialize)]
pub struct OutputStatus {
    pub name: String,
    pub format: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputStatus {
    pub fn pending(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            content_type: None,
            size_bytes: None,
            error: None,
        }
    }
}

/// Point-in-time view of a job, as returned by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: &'static str,

    /// Index of the running stage when state is "running"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,

    pub created_at: DateTime<Utc>,
    pub pipeline: Vec<String>,
    pub diagnostics: Vec<StageDiagnostic>,
    pub outputs: Vec<OutputStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
