//! Decoder adapter using symphonia
//!
//! Probes an in-memory byte payload for its container/codec and decodes the
//! whole asset to interleaved f32 PCM at the source's native sample rate and
//! channel count. Detection trusts content, not the caller's mime hint; the
//! hint only seeds the probe. Normalization to the canonical rate happens
//! later in the job runner, never here.

use crate::audio::buffer::AudioBuffer;
use crate::error::{DecodeReason, Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an uploaded payload to canonical PCM.
///
/// # Returns
/// An [`AudioBuffer`] at the source's native rate and channel layout.
///
/// # Errors
/// - `DecodeReason::Empty` for a zero-length payload
/// - `DecodeReason::Unsupported` when the probe recognizes no format
/// - `DecodeReason::Corrupt` when a recognized stream yields no audio
pub fn decode(bytes: &[u8], mime_hint: Option<&str>) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(Error::Decode(DecodeReason::Empty));
    }

    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    // The hint helps the probe try likely formats first; content wins
    let mut hint = Hint::new();
    if let Some(mime) = mime_hint {
        hint.mime_type(mime);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| {
            debug!("Format probe failed: {}", e);
            Error::Decode(DecodeReason::Unsupported)
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(Error::Decode(DecodeReason::Corrupt))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(Error::Decode(DecodeReason::Corrupt))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or(Error::Decode(DecodeReason::Corrupt))?;

    debug!(
        "Decoding payload: sample_rate={}, channels={}",
        sample_rate, channels
    );

    let decoder_opts = DecoderOptions::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| {
            debug!("No decoder for codec: {}", e);
            Error::Decode(DecodeReason::Unsupported)
        })?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_samples(&decoded, &mut samples),
            Err(e) => {
                warn!("Decode error, skipping packet: {}", e);
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode(DecodeReason::Corrupt));
    }

    debug!(
        "Decoded {} samples ({} frames)",
        samples.len(),
        samples.len() / channels as usize
    );

    Ok(AudioBuffer::new(sample_rate, channels, samples))
}

/// Convert one decoded symphonia buffer to interleaved f32 in [-1.0, 1.0]
fn append_samples(decoded: &AudioBufferRef, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(buf, output, |s| s),
        AudioBufferRef::F64(buf) => interleave(buf, output, |s| s as f32),
        AudioBufferRef::S32(buf) => interleave(buf, output, |s| s as f32 / i32::MAX as f32),
        AudioBufferRef::S16(buf) => interleave(buf, output, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S8(buf) => interleave(buf, output, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S24(buf) => {
            interleave(buf, output, |s| s.inner() as f32 / 8388608.0)
        }
        AudioBufferRef::U32(buf) => interleave(buf, output, |s| {
            ((s as f64 - 2147483648.0) / 2147483648.0) as f32
        }),
        AudioBufferRef::U16(buf) => {
            interleave(buf, output, |s| (s as i32 - 32768) as f32 / 32768.0)
        }
        AudioBufferRef::U8(buf) => interleave(buf, output, |s| (s as i32 - 128) as f32 / 128.0),
        AudioBufferRef::U24(buf) => interleave(buf, output, |s| {
            (s.inner() as i32 - 8388608) as f32 / 8388608.0
        }),
    }
}

/// Interleave a planar symphonia buffer, converting each sample to f32
fn interleave<S, F>(
    buf: &symphonia::core::audio::AudioBuffer<S>,
    output: &mut Vec<f32>,
    convert: F,
) where
    S: symphonia::core::sample::Sample + Copy,
    F: Fn(S) -> f32,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    output.reserve(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            output.push(convert(buf.chan(ch_idx)[frame_idx]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer
                    .write_sample((s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_empty_payload() {
        let err = decode(&[], None).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeReason::Empty)));
    }

    #[test]
    fn test_unrecognized_payload() {
        let garbage = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let err = decode(&garbage, None).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeReason::Unsupported)));
    }

    #[test]
    fn test_wav_roundtrip() {
        let samples: Vec<f32> = (0..4410)
            .flat_map(|i| {
                let t = i as f32 / 44100.0;
                let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
                [s, s]
            })
            .collect();
        let bytes = wav_bytes(44100, 2, &samples);

        let buffer = decode(&bytes, Some("audio/wav")).unwrap();
        assert_eq!(buffer.sample_rate, 44100);
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.frames(), 4410);
        // 16-bit quantization keeps samples within 1/32767 of the original
        assert!((buffer.peak() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_mono_stays_mono() {
        let samples: Vec<f32> = (0..1000).map(|i| (i % 100) as f32 / 200.0).collect();
        let bytes = wav_bytes(22050, 1, &samples);

        let buffer = decode(&bytes, None).unwrap();
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.sample_rate, 22050);
        assert_eq!(buffer.frames(), 1000);
    }

    #[test]
    fn test_misleading_hint_is_ignored() {
        let samples = vec![0.1f32; 2000];
        let bytes = wav_bytes(44100, 2, &samples);

        // Content detection wins over a wrong mime hint
        let buffer = decode(&bytes, Some("audio/mpeg")).unwrap();
        assert_eq!(buffer.sample_rate, 44100);
        assert_eq!(buffer.channels, 2);
    }
}
