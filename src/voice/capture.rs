//! Audio capture from microphone

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::{AudioInput, ChunkSink};
use crate::{Error, Result};

/// Default sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Microphone input on the default cpal device
///
/// Opening the device plays the role of the permission prompt. Each
/// recording sub-session buffers samples and, when finalized, pushes a
/// single WAV chunk to the sink.
pub struct CpalInput {
    sample_rate: u32,
    device: Option<OpenDevice>,
    samples: Arc<Mutex<Vec<f32>>>,
    recording: Option<ActiveRecording>,
}

struct OpenDevice {
    device: Device,
    config: StreamConfig,
}

struct ActiveRecording {
    stream: Stream,
    sink: ChunkSink,
}

impl CpalInput {
    /// Create an input that will record at `sample_rate`
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            device: None,
            samples: Arc::new(Mutex::new(Vec::new())),
            recording: None,
        }
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Check if a recording sub-session is running
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Get the samples buffered by the running sub-session without clearing
    #[must_use]
    pub fn peek_samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    fn take_samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

impl Default for CpalInput {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

#[async_trait(?Send)]
impl AudioInput for CpalInput {
    async fn open(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let config = input_config(&device, self.sample_rate)?;

        tracing::debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels = config.channels,
            "audio input opened"
        );

        self.device = Some(OpenDevice { device, config });
        Ok(())
    }

    async fn begin(&mut self, sink: ChunkSink) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::AlreadyRecording);
        }
        let open = self.device.as_ref().ok_or(Error::NoActiveStream)?;

        drop(self.take_samples());
        let samples = Arc::clone(&self.samples);
        let channels = usize::from(open.config.channels);

        let stream = open
            .device
            .build_input_stream(
                &open.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = samples.lock() {
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            buf.extend(data.chunks(channels).map(downmix));
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.recording = Some(ActiveRecording { stream, sink });

        tracing::debug!("audio capture started");
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let Some(ActiveRecording { stream, sink }) = self.recording.take() else {
            return Err(Error::NotRecording);
        };
        drop(stream);

        let samples = self.take_samples();
        let wav = samples_to_wav(&samples, self.sample_rate)?;

        tracing::debug!(
            samples = samples.len(),
            bytes = wav.len(),
            "audio capture finalized"
        );

        sink.push(wav);
        Ok(())
    }

    fn close(&mut self) {
        let was_recording = self.recording.take().is_some();
        if self.device.take().is_some() {
            drop(self.take_samples());
            tracing::debug!(was_recording, "audio input released");
        }
    }
}

/// Pick a stream config at `sample_rate`, preferring mono
fn input_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
        c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && supports_rate(c))
        .or_else(|| {
            // Fallback: any channel count, downmixed in the callback
            device
                .supported_input_configs()
                .ok()?
                .find(|c| supports_rate(c))
        })
        .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

    Ok(supported_config.with_sample_rate(rate).config())
}

/// Average one interleaved frame down to a single sample
#[allow(clippy::cast_precision_loss)]
fn downmix(frame: &[f32]) -> f32 {
    frame.iter().sum::<f32>() / frame.len() as f32
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
