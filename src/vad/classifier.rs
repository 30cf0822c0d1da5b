//! Frame classifier wrapping webrtc-vad.
//!
//! A classifier decides speech/silence for one fixed-duration frame at a
//! time. It keeps no state across calls: the same frame with the same
//! aggressiveness always yields the same decision.

use serde::{Deserialize, Serialize};
use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::audio::AudioFrame;
use crate::config::CaptureConfig;

/// Classifier aggressiveness: how strict the engine is about calling a frame
/// speech. Higher modes reject more noise at the risk of clipping quiet
/// speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggressiveness {
    /// Least aggressive; best for clean audio environments
    Quality = 0,
    /// Optimised for low-bitrate audio
    LowBitrate = 1,
    /// Good for moderate background noise (the original assistant's default)
    #[default]
    Aggressive = 2,
    /// Most aggressive; best for noisy environments
    VeryAggressive = 3,
}

impl Aggressiveness {
    fn from_level(level: u8) -> Result<Self, VadError> {
        match level {
            0 => Ok(Self::Quality),
            1 => Ok(Self::LowBitrate),
            2 => Ok(Self::Aggressive),
            3 => Ok(Self::VeryAggressive),
            other => Err(VadError::InvalidAggressiveness(other)),
        }
    }
}

impl From<Aggressiveness> for VadMode {
    fn from(mode: Aggressiveness) -> Self {
        match mode {
            Aggressiveness::Quality => VadMode::Quality,
            Aggressiveness::LowBitrate => VadMode::LowBitrate,
            Aggressiveness::Aggressive => VadMode::Aggressive,
            Aggressiveness::VeryAggressive => VadMode::VeryAggressive,
        }
    }
}

/// Configuration errors caught once at startup. The classifier itself cannot
/// fail after construction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VadError {
    #[error("unsupported sample rate {0} Hz (expected 8000, 16000, 32000 or 48000)")]
    UnsupportedSampleRate(u32),

    #[error("unsupported frame duration {0} ms (expected 10, 20 or 30)")]
    UnsupportedFrameDuration(u32),

    #[error("VAD aggressiveness must be 0-3, got {0}")]
    InvalidAggressiveness(u8),
}

/// Per-frame speech/silence classifier.
///
/// The underlying `Vad` is `!Send`, so the classifier lives on the thread
/// driving the capture loop.
pub struct Classifier {
    vad: Vad,
    frame_samples: usize,
}

impl Classifier {
    /// Create a classifier for the configured sample rate, frame duration and
    /// aggressiveness. All three are validated here, never at runtime.
    pub fn new(config: &CaptureConfig) -> Result<Self, VadError> {
        let rate = match config.sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            32000 => SampleRate::Rate32kHz,
            48000 => SampleRate::Rate48kHz,
            other => return Err(VadError::UnsupportedSampleRate(other)),
        };

        if ![10, 20, 30].contains(&config.frame_ms) {
            return Err(VadError::UnsupportedFrameDuration(config.frame_ms));
        }

        let mode = Aggressiveness::from_level(config.aggressiveness)?;
        let vad = Vad::new_with_rate_and_mode(rate, mode.into());

        Ok(Self { vad, frame_samples: config.frame_samples() })
    }

    /// Number of samples one frame must contain.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Classify one frame: `true` for speech, `false` for silence.
    ///
    /// Frame length was validated at construction; if the engine still
    /// rejects a frame the decision is silence, matching the original
    /// assistant's behavior.
    pub fn classify(&mut self, frame: &AudioFrame) -> bool {
        debug_assert_eq!(frame.samples.len(), self.frame_samples);
        self.vad.is_voice_segment(&frame.samples).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(frame_ms: u32, aggressiveness: u8) -> CaptureConfig {
        use clap::Parser;
        let mut config = CaptureConfig::try_parse_from(["turn-capture"]).unwrap();
        config.frame_ms = frame_ms;
        config.aggressiveness = aggressiveness;
        config
    }

    #[test]
    fn test_frame_samples_per_duration() {
        assert_eq!(Classifier::new(&config_with(10, 2)).unwrap().frame_samples(), 160);
        assert_eq!(Classifier::new(&config_with(20, 2)).unwrap().frame_samples(), 320);
        assert_eq!(Classifier::new(&config_with(30, 2)).unwrap().frame_samples(), 480);
    }

    #[test]
    fn test_rejects_bad_aggressiveness() {
        let result = Classifier::new(&config_with(30, 7));
        assert!(matches!(result, Err(VadError::InvalidAggressiveness(7))));
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let mut config = config_with(30, 2);
        config.sample_rate = 22050;
        assert!(matches!(Classifier::new(&config), Err(VadError::UnsupportedSampleRate(22050))));
    }

    #[test]
    fn test_silence_frame_is_silence() {
        let mut classifier = Classifier::new(&config_with(30, 2)).unwrap();
        let frame = AudioFrame { samples: vec![0i16; 480] };
        assert!(!classifier.classify(&frame));
    }

    #[test]
    fn test_decisions_are_idempotent() {
        // Same frame, same aggressiveness: identical decision every time.
        let mut classifier = Classifier::new(&config_with(30, 2)).unwrap();
        let frame = AudioFrame {
            samples: (0..480).map(|i| ((i as f32 * 0.3).sin() * 12000.0) as i16).collect(),
        };
        let first = classifier.classify(&frame);
        for _ in 0..5 {
            assert_eq!(classifier.classify(&frame), first);
        }
    }

    #[test]
    fn test_aggressiveness_levels_map() {
        assert_eq!(Aggressiveness::from_level(0).unwrap(), Aggressiveness::Quality);
        assert_eq!(Aggressiveness::from_level(3).unwrap(), Aggressiveness::VeryAggressive);
        assert!(Aggressiveness::from_level(4).is_err());
    }
}
