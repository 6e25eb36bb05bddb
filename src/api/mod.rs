//! HTTP API for waveforge
//!
//! Exposes the job lifecycle over REST: submit, poll, fetch artifacts,
//! cancel. All processing errors after admission are observed through the
//! status endpoint, never as HTTP failures.

pub mod handlers;
pub mod server;

pub use server::{create_router, run, AppContext};
