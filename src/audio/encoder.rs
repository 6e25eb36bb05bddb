//! Encoder adapter
//!
//! Renders canonical PCM into output bytes. Two lossless WAV targets via
//! hound (16-bit integer and 32-bit float) and one lossy target via LAME
//! (MP3, 192 kbps). Each encode call is independent; the job coordinator
//! records per-output success or failure.

use crate::audio::buffer::AudioBuffer;
use crate::error::{EncodeReason, Error, Result};
use std::io::Cursor;
use tracing::debug;

/// Supported output targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// WAV, 16-bit signed PCM (lossless)
    Wav16,

    /// WAV, 32-bit float PCM (lossless)
    WavFloat,

    /// MP3 via LAME, 192 kbps (lossy)
    Mp3,
}

impl OutputFormat {
    /// Parse the wire-level format name used in output requests and the
    /// format-tag stage.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "wav" => Ok(OutputFormat::Wav16),
            "wav-float" => Ok(OutputFormat::WavFloat),
            "mp3" => Ok(OutputFormat::Mp3),
            _ => Err(Error::Encode(EncodeReason::UnsupportedFormat)),
        }
    }

    /// MIME content type of the encoded bytes
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav16 | OutputFormat::WavFloat => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// Encoded output bytes plus their content type
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Encode a buffer into the requested target format.
///
/// # Errors
/// `EncodeReason::InvalidBuffer` for an empty buffer or a channel layout the
/// target cannot carry (MP3 is mono/stereo only).
pub fn encode(buffer: &AudioBuffer, format: OutputFormat) -> Result<EncodedAudio> {
    if buffer.samples.is_empty() || buffer.sample_rate == 0 {
        return Err(Error::Encode(EncodeReason::InvalidBuffer));
    }

    debug!(
        "Encoding {} frames at {}Hz ({} channels) to {:?}",
        buffer.frames(),
        buffer.sample_rate,
        buffer.channels,
        format
    );

    let bytes = match format {
        OutputFormat::Wav16 => encode_wav16(buffer)?,
        OutputFormat::WavFloat => encode_wav_float(buffer)?,
        OutputFormat::Mp3 => encode_mp3(buffer)?,
    };

    Ok(EncodedAudio {
        bytes,
        content_type: format.content_type(),
    })
}

fn encode_wav16(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Internal(format!("WAV writer init failed: {}", e)))?;
        for sample in &buffer.samples {
            let quantized = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            writer
                .write_sample(quantized)
                .map_err(|e| Error::Internal(format!("WAV write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Internal(format!("WAV finalize failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

fn encode_wav_float(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Internal(format!("WAV writer init failed: {}", e)))?;
        for sample in &buffer.samples {
            writer
                .write_sample(*sample)
                .map_err(|e| Error::Internal(format!("WAV write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Internal(format!("WAV finalize failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

fn encode_mp3(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Builder, FlushNoGap, InterleavedPcm, MonoPcm};

    if buffer.channels > 2 {
        return Err(Error::Encode(EncodeReason::InvalidBuffer));
    }

    let mut builder = Builder::new().ok_or_else(|| {
        Error::Internal("Failed to allocate LAME encoder".to_string())
    })?;

    builder
        .set_num_channels(buffer.channels as u8)
        .map_err(|_| Error::Encode(EncodeReason::InvalidBuffer))?;
    builder
        .set_sample_rate(buffer.sample_rate)
        .map_err(|_| Error::Encode(EncodeReason::InvalidBuffer))?;
    builder
        .set_brate(mp3lame_encoder::Birtate::Kbps192)
        .map_err(|e| Error::Internal(format!("LAME bitrate setup failed: {:?}", e)))?;
    builder
        .set_quality(mp3lame_encoder::Quality::Best)
        .map_err(|e| Error::Internal(format!("LAME quality setup failed: {:?}", e)))?;

    let mut encoder = builder
        .build()
        .map_err(|e| Error::Internal(format!("LAME init failed: {:?}", e)))?;

    let pcm: Vec<i16> = buffer
        .samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect();

    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(buffer.frames()));

    let written = if buffer.channels == 1 {
        encoder
            .encode(MonoPcm(&pcm), out.spare_capacity_mut())
            .map_err(|e| Error::Internal(format!("MP3 encode failed: {:?}", e)))?
    } else {
        encoder
            .encode(InterleavedPcm(&pcm), out.spare_capacity_mut())
            .map_err(|e| Error::Internal(format!("MP3 encode failed: {:?}", e)))?
    };
    // SAFETY: the encoder reports how many bytes of the spare capacity it filled
    unsafe {
        out.set_len(out.len() + written);
    }

    let written = encoder
        .flush::<FlushNoGap>(out.spare_capacity_mut())
        .map_err(|e| Error::Internal(format!("MP3 flush failed: {:?}", e)))?;
    // SAFETY: as above
    unsafe {
        out.set_len(out.len() + written);
    }

    Ok(out)
}
