//! Capture pipeline configuration and CLI argument parsing.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Sample rates the WebRTC voice activity detector accepts.
const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8000, 16000, 32000, 48000];

/// Frame durations (ms) the WebRTC voice activity detector accepts.
const SUPPORTED_FRAME_MS: [u32; 3] = [10, 20, 30];

/// Turn capture configuration.
///
/// Environment variable names match the original assistant's `.env` settings
/// so an existing deployment keeps working unchanged.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "turn-capture")]
#[command(version, about = "Voice turn capture pipeline", long_about = None)]
pub struct CaptureConfig {
    /// Audio sample rate for capture and classification
    #[arg(long, env = "SAMPLE_RATE", default_value = "16000")]
    pub sample_rate: u32,

    /// Duration of one classified frame in milliseconds (10, 20 or 30)
    #[arg(long, env = "VAD_FRAME_MS", default_value = "30")]
    pub frame_ms: u32,

    /// VAD aggressiveness (0-3, higher classifies more audio as silence)
    #[arg(long, env = "VAD_AGGRESSIVENESS", default_value = "2")]
    pub aggressiveness: u8,

    /// Trailing silence duration (seconds) that ends a turn after speech
    #[arg(long, env = "TRAILING_SILENCE_SEC", default_value = "1.5")]
    pub trailing_silence_sec: f32,

    /// Hard ceiling on one turn's duration in seconds
    #[arg(long, env = "MAX_RECORD_SEC", default_value = "90")]
    pub max_record_sec: f32,

    /// Silence duration (seconds) before giving up when no speech was heard
    #[arg(long, env = "IDLE_TIMEOUT_SEC", default_value = "30")]
    pub idle_timeout_sec: f32,

    /// Leading-silence trim threshold (mean absolute i16 amplitude)
    #[arg(long, env = "ENERGY_THRESHOLD", default_value = "350")]
    pub energy_threshold: f32,

    /// WAV file looped while waiting for the user to speak
    #[arg(long, env = "WAITING_WAV", default_value = "waiting.wav")]
    pub waiting_wav: PathBuf,

    /// Waiting tone volume (0.0 - 1.0)
    #[arg(long, env = "WAITING_VOLUME", default_value = "0.3", value_parser = parse_volume)]
    pub waiting_volume: f32,

    /// Save the raw untrimmed capture of every turn to a temp WAV file
    #[arg(long, env = "DEBUG_AUDIO")]
    pub debug_audio: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl CaptureConfig {
    /// Parse configuration from command line arguments and the environment.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Number of samples in one classifier frame.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate / 1000) as usize * self.frame_ms as usize
    }

    /// Trailing-silence threshold expressed in whole frames.
    pub fn trailing_silence_frames(&self) -> u32 {
        (self.trailing_silence_sec * 1000.0 / self.frame_ms as f32) as u32
    }

    /// Idle timeout expressed in whole frames.
    pub fn idle_timeout_frames(&self) -> u32 {
        (self.idle_timeout_sec * 1000.0 / self.frame_ms as f32) as u32
    }

    /// Maximum turn duration expressed in whole frames.
    pub fn max_record_frames(&self) -> u32 {
        (self.max_record_sec * 1000.0 / self.frame_ms as f32) as u32
    }

    /// Validate the configuration.
    ///
    /// Every violation here is fatal at startup; the capture loop assumes a
    /// valid configuration and never re-checks these at runtime.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            anyhow::bail!("Sample rate must be one of {:?} Hz, got {}", SUPPORTED_SAMPLE_RATES, self.sample_rate);
        }

        if !SUPPORTED_FRAME_MS.contains(&self.frame_ms) {
            anyhow::bail!("Frame duration must be one of {:?} ms, got {}", SUPPORTED_FRAME_MS, self.frame_ms);
        }

        if self.aggressiveness > 3 {
            anyhow::bail!("VAD aggressiveness must be between 0 and 3, got {}", self.aggressiveness);
        }

        if self.trailing_silence_sec <= 0.0 {
            anyhow::bail!("Trailing silence threshold must be positive");
        }

        if self.idle_timeout_sec <= 0.0 {
            anyhow::bail!("Idle timeout must be positive");
        }

        if self.max_record_sec <= self.trailing_silence_sec {
            anyhow::bail!(
                "Max record duration ({}s) must exceed the trailing silence threshold ({}s)",
                self.max_record_sec,
                self.trailing_silence_sec
            );
        }

        if self.energy_threshold <= 0.0 {
            anyhow::bail!("Energy threshold must be positive");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Sample rate: {} Hz", self.sample_rate);
        info!("  Frame duration: {} ms ({} samples)", self.frame_ms, self.frame_samples());
        info!("  VAD aggressiveness: {}", self.aggressiveness);
        info!("  Trailing silence: {}s ({} frames)", self.trailing_silence_sec, self.trailing_silence_frames());
        info!("  Max record duration: {}s", self.max_record_sec);
        info!("  Idle timeout: {}s", self.idle_timeout_sec);
        info!("  Energy threshold: {}", self.energy_threshold);
        info!("  Waiting tone: {} (volume {})", self.waiting_wav.display(), self.waiting_volume);
        if self.debug_audio {
            info!("  Debug audio dumps enabled");
        }
    }
}

/// Parse and validate a volume value (0.0-1.0).
fn parse_volume(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a valid float", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("volume must be between 0.0 and 1.0, got {}", value))
    }
}
