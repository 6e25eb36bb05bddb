//! Error types for waveforge
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Validation errors are the only errors surfaced synchronously at submission;
//! everything else is recorded on the Job and observed through status polling.

use thiserror::Error;
use uuid::Uuid;

/// Why a decode attempt was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReason {
    /// Container/codec not recognized by the probe
    #[error("unrecognized container or codec")]
    Unsupported,

    /// Recognized container but no usable audio could be extracted
    #[error("truncated or corrupt audio data")]
    Corrupt,

    /// Zero-length payload
    #[error("empty payload")]
    Empty,
}

/// Why a pipeline spec failed validation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    #[error("unknown stage")]
    UnknownStage,

    #[error("missing required parameter")]
    MissingParameter,

    #[error("invalid parameter value")]
    InvalidParameterValue,

    #[error("unknown parameter")]
    UnknownParameter,
}

/// Why an encode attempt was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeReason {
    #[error("unsupported output format")]
    UnsupportedFormat,

    #[error("buffer cannot be encoded to this format")]
    InvalidBuffer,
}

/// Main error type for waveforge
#[derive(Error, Debug)]
pub enum Error {
    /// Audio decoding errors
    #[error("Decode error: {0}")]
    Decode(DecodeReason),

    /// Pipeline spec validation errors (surfaced synchronously, never create a Job)
    #[error("Invalid pipeline spec at stage '{stage}', parameter '{}': {reason}", .field.as_deref().unwrap_or("-"))]
    Validation {
        stage: String,
        field: Option<String>,
        reason: ValidationReason,
    },

    /// Stage name already registered
    #[error("Duplicate stage registration: {0}")]
    DuplicateStage(String),

    /// Stage rejected its input or parameters at runtime
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// Stage produced an empty, misaligned, or non-finite buffer
    #[error("Stage '{stage}' produced invalid numeric data")]
    StageNumeric { stage: String },

    /// Audio encoding errors
    #[error("Encode error: {0}")]
    Encode(EncodeReason),

    /// Job exceeded its wall-clock budget
    #[error("Job exceeded its wall-clock budget")]
    Timeout,

    /// Job cancelled by caller
    #[error("Job cancelled by caller")]
    Cancelled,

    /// Queue backlog limit reached
    #[error("Job queue is full")]
    CapacityExceeded,

    /// Job id not present (never existed or evicted)
    #[error("Job not found: {0}")]
    UnknownJob(Uuid),

    /// Cancel requested for a job already in a terminal state
    #[error("Job already in a terminal state: {0}")]
    AlreadyTerminal(Uuid),

    /// Artifact requested before the job succeeded, or for an unknown output name
    #[error("Artifact not available: {0}")]
    ArtifactNotAvailable(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using waveforge Error
pub type Result<T> = std::result::Result<T, Error>;
