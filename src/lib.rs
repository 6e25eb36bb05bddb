//! waveforge - audio processing pipeline service
//!
//! Accepts uploaded audio, decodes it to a canonical interleaved f32 PCM
//! representation, runs a caller-specified chain of deterministic transform
//! stages over it, and encodes the result into one or more output formats.
//! Jobs run asynchronously on a bounded worker pool and are observed through
//! a small REST API.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod stage;
pub mod store;

pub use error::{Error, Result};
