//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioClip, AudioOutput};
use crate::{Error, Result};

/// Sample rate assumed for MP3 data that reports none (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays reply audio on the default output device
///
/// The cpal stream is built and dropped inside a blocking task per clip,
/// so nothing device-side outlives a single playback. `Default` skips the
/// upfront device probe.
#[derive(Debug, Default)]
pub struct SpeakerOutput {
    device_name: String,
}

impl SpeakerOutput {
    /// Create a new playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, "audio playback initialized");

        Ok(Self { device_name })
    }

    /// Name of the output device reported at construction
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Play raw f32 samples
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        tokio::task::spawn_blocking(move || play_samples_blocking(samples, sample_rate))
            .await
            .map_err(|e| Error::Playback(e.to_string()))?
    }
}

#[async_trait(?Send)]
impl AudioOutput for SpeakerOutput {
    async fn play(&mut self, clip: AudioClip) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = decode_mp3(clip.bytes())?;
            drop(clip);
            play_samples_blocking(samples, sample_rate)
        })
        .await
        .map_err(|e| Error::Playback(e.to_string()))?
    }
}

/// Play samples in a blocking manner, returning when the buffer has drained
fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let channels = usize::from(config.channels);
    let sample_count = samples.len();

    let finished = Arc::new(AtomicBool::new(false));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let finished_clone = Arc::clone(&finished);
    let failure_clone = Arc::clone(&failure);
    let mut position = 0usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(position).copied().unwrap_or_else(|| {
                        finished_clone.store(true, Ordering::Release);
                        0.0
                    });
                    frame.fill(sample);

                    if position < samples.len() {
                        position += 1;
                    }
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio playback error");
                if let Ok(mut slot) = failure_clone.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate);

    // Poll for completion with timeout
    let start = Instant::now();
    let timeout = Duration::from_millis(duration_ms + 500);

    loop {
        if let Some(err) = failure.lock().ok().and_then(|mut slot| slot.take()) {
            return Err(Error::Playback(err));
        }
        if finished.load(Ordering::Acquire) {
            break;
        }
        if start.elapsed() > timeout {
            tracing::warn!(duration_ms, "playback never reported completion");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Small delay to ensure audio finishes
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, sample_rate, "playback complete");

    Ok(())
}

/// Pick an output config at `sample_rate`, preferring mono then stereo
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let fits = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?
        .find(|c| fits(c, 1))
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| fits(c, 2))
        })
        .ok_or_else(|| {
            Error::Playback(format!("no suitable output config for {sample_rate} Hz"))
        })?;

    Ok(supported_config.with_sample_rate(rate).config())
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// # Errors
///
/// Returns [`Error::Decode`] if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate.is_none() {
                    sample_rate = u32::try_from(frame.sample_rate).ok().filter(|r| *r > 0);
                }

                // Convert i16 samples to f32 and handle stereo to mono
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Decode(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() && !mp3_data.is_empty() {
        return Err(Error::Decode("no MP3 frames found".to_string()));
    }

    Ok((samples, sample_rate.unwrap_or(PLAYBACK_SAMPLE_RATE)))
}
