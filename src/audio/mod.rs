//! Audio subsystem: canonical PCM buffers, decoding, resampling, encoding

pub mod buffer;
pub mod decoder;
pub mod encoder;
pub mod resampler;

pub use buffer::AudioBuffer;
pub use encoder::{EncodedAudio, OutputFormat};
