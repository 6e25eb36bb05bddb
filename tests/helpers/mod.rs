//! Test helper modules for waveforge integration tests
//!
//! Provides WAV fixture generation plus small utilities shared by the
//! pipeline, coordinator, and API test suites.

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::io::Cursor;
use std::time::{Duration, Instant};
use uuid::Uuid;
use waveforge::audio::AudioBuffer;
use waveforge::error::Result;
use waveforge::job::{JobCoordinator, JobSnapshot};
use waveforge::stage::{Stage, StageDefinition, StageOutput, StageParams};

/// Render a sine tone as a 16-bit PCM WAV byte stream
pub fn sine_wav_bytes(
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
    freq_hz: f32,
    amplitude: f32,
) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * freq_hz * t).sin() * amplitude;
            let quantized = (sample * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(quantized).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Render a WAV with leading and trailing silence around a tone burst
pub fn padded_wav_bytes(sample_rate: u32, silence_ms: u64, tone_ms: u64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let silence_frames = (sample_rate as u64 * silence_ms / 1000) as usize;
    let tone_frames = (sample_rate as u64 * tone_ms / 1000) as usize;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..silence_frames {
            writer.write_sample(0i16).unwrap();
        }
        for i in 0..tone_frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        for _ in 0..silence_frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Peak amplitude of a decoded 16-bit WAV byte stream, on the [0, 1] scale
pub fn wav_peak(bytes: &[u8]) -> f32 {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    reader
        .samples::<i16>()
        .map(|s| (s.unwrap() as f32 / i16::MAX as f32).abs())
        .fold(0.0, f32::max)
}

/// Poll a job until it reaches a terminal state
pub fn wait_terminal(coordinator: &JobCoordinator, id: Uuid, timeout: Duration) -> JobSnapshot {
    let deadline = Instant::now() + timeout;
    loop {
        let snapshot = coordinator.status(id).unwrap();
        if matches!(snapshot.state, "succeeded" | "failed" | "cancelled") {
            return snapshot;
        }
        if Instant::now() >= deadline {
            panic!("job {} still {} after {:?}", id, snapshot.state, timeout);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Test stage that sleeps before passing its input through unchanged
pub struct SlowStage {
    pub delay: Duration,
}

impl Stage for SlowStage {
    fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: "slow",
            params: vec![],
        }
    }

    fn transform(&self, input: &AudioBuffer, _params: &StageParams) -> Result<StageOutput> {
        std::thread::sleep(self.delay);
        Ok(input.clone().into())
    }
}
