//! Waiting-tone playback.
//!
//! Loops a short ambient cue while the pipeline waits for the user to start
//! speaking. Playback runs on its own thread and never touches the capture
//! path; the orchestrator stops it through a cancellation token the moment
//! speech is detected or the session ends.
//!
//! A missing or unreadable asset, or an unusable output device, degrades to
//! no playback with a warning. Capture proceeds normally either way.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::resampler::resample;
use super::util::{device_name, downmix_mono, find_best_config};

/// How often the playback thread polls for cancellation.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to a looping waiting tone.
///
/// Dropping the handle stops playback and releases the output device; `stop`
/// does the same explicitly.
pub struct WaitingTone {
    token: CancellationToken,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl WaitingTone {
    /// Start looping the tone asset at the given volume.
    ///
    /// Never fails: asset or device problems are logged and playback is
    /// skipped, returning an inert handle.
    pub fn start(asset: &Path, volume: f32) -> Self {
        let token = CancellationToken::new();

        let samples = match load_tone(asset, volume) {
            Ok((samples, sample_rate)) => (samples, sample_rate),
            Err(e) => {
                warn!("Waiting tone unavailable ({}), capture continues without it", e);
                return Self { token, handle: None };
            }
        };

        let thread_token = token.clone();
        let handle = std::thread::spawn(move || {
            let (samples, sample_rate) = samples;
            if let Err(e) = play_loop(&samples, sample_rate, &thread_token) {
                warn!("Waiting tone playback failed ({}), capture continues without it", e);
            }
        });

        Self { token, handle: Some(handle) }
    }

    /// Signal the playback thread to stop, without waiting for it.
    ///
    /// Idempotent and non-blocking, so the frame loop can call it the moment
    /// speech is detected. The thread is joined by `stop` or on drop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stop playback and wait for the playback thread to release the device.
    pub fn stop(mut self) {
        self.cancel_and_join();
    }

    fn cancel_and_join(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WaitingTone {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

/// Load the tone asset: decode, downmix to mono, apply volume.
///
/// Returns the scaled samples and their native sample rate.
fn load_tone(asset: &Path, volume: f32) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(asset).with_context(|| format!("Failed to open tone asset {}", asset.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>().context("Failed to decode tone asset")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode tone asset")?
        }
    };

    if samples.is_empty() {
        anyhow::bail!("Tone asset {} contains no samples", asset.display());
    }

    let mut mono = downmix_mono(&samples, spec.channels as usize);
    for sample in &mut mono {
        *sample *= volume;
    }

    Ok((mono, spec.sample_rate))
}

/// Loop the tone through the default output device until cancelled.
fn play_loop(samples: &[f32], sample_rate: u32, token: &CancellationToken) -> Result<()> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("No output device available")?;

    debug!("Waiting tone on output device: {}", device_name(&device));

    let supported_configs = device.supported_output_configs().context("Failed to get supported output configs")?;
    let config = find_best_config(supported_configs, sample_rate)?;
    let device_sample_rate = config.sample_rate();

    let samples = if device_sample_rate != sample_rate { resample(samples, sample_rate, device_sample_rate)? } else { samples.to_vec() };
    if samples.is_empty() {
        anyhow::bail!("Tone asset empty after resampling");
    }

    let channels = config.channels() as usize;
    let stream_config: StreamConfig = config.config();

    let err_fn = |err| {
        tracing::warn!("Waiting tone stream error: {}", err);
    };

    let mut position = 0usize;
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let sample = samples[position];
                position = (position + 1) % samples.len();
                for channel in frame.iter_mut() {
                    *channel = sample;
                }
            }
        },
        err_fn,
        None,
    )?;

    stream.play().context("Failed to start tone stream")?;

    while !token.is_cancelled() {
        std::thread::sleep(STOP_POLL_INTERVAL);
    }

    // Stream drops here, releasing the device.
    debug!("Waiting tone stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, channels: u16, value: i16, len: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..len * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_missing_asset_is_an_error() {
        assert!(load_tone(Path::new("/nonexistent/waiting.wav"), 0.3).is_err());
    }

    #[test]
    fn test_missing_asset_degrades_to_inert_handle() {
        let tone = WaitingTone::start(Path::new("/nonexistent/waiting.wav"), 0.3);
        assert!(tone.handle.is_none());
        tone.stop();
    }

    #[test]
    fn test_cancel_unblocks_playback_thread_before_join() {
        // cancel() must not wait on the thread; the later stop() joins a
        // thread that has already been told to exit.
        let token = CancellationToken::new();
        let thread_token = token.clone();
        let handle = std::thread::spawn(move || {
            while !thread_token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let tone = WaitingTone { token, handle: Some(handle) };
        tone.cancel();
        assert!(tone.handle.is_some()); // still alive to be joined
        tone.stop();
    }

    #[test]
    fn test_load_applies_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1, 16384, 100);

        let (samples, rate) = load_tone(&path, 0.5).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(samples.len(), 100);
        assert!((samples[0] - 0.25).abs() < 1e-3); // 0.5 amplitude * 0.5 volume
    }

    #[test]
    fn test_load_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_test_wav(&path, 2, 8192, 50);

        let (samples, _) = load_tone(&path, 1.0).unwrap();
        assert_eq!(samples.len(), 50);
    }

    #[test]
    fn test_empty_asset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_test_wav(&path, 1, 0, 0);
        assert!(load_tone(&path, 1.0).is_err());
    }
}
