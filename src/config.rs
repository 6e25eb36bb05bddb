//! Service configuration
//!
//! Settings load in layers: built-in defaults, then an optional TOML file,
//! then command-line/environment overrides applied in main.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Waveforge service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads running jobs in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of submitted jobs awaiting a worker. The count covers
    /// every job not yet claimed by a worker thread, so a burst of
    /// submissions can be rejected while running slots are still filling.
    #[serde(default = "default_queue_backlog")]
    pub queue_backlog: usize,

    /// Sample rate decoded audio is normalized to when the pipeline does
    /// not start with an explicit resample stage
    #[serde(default = "default_canonical_sample_rate")]
    pub canonical_sample_rate: u32,

    /// Default wall-clock budget per job in milliseconds (None = unlimited).
    /// Individual submissions may override this.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    8501
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(2)
}

fn default_queue_backlog() -> usize {
    32
}

fn default_canonical_sample_rate() -> u32 {
    44100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            workers: default_workers(),
            queue_backlog: default_queue_backlog(),
            canonical_sample_rate: default_canonical_sample_rate(),
            default_timeout_ms: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}
