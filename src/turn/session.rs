//! Capture session orchestrator.
//!
//! Owns the lifecycle of one turn: waiting tone, microphone stream, frame
//! assembly, classification, the state machine, and the final energy trim.
//! The microphone and the tone are released on every exit path, including
//! cancellation and device failure.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::trim::{TRIM_WINDOW, trim_leading_silence};
use crate::audio::{Capturer, FrameAssembler, WaitingTone};
use crate::config::CaptureConfig;
use crate::stt::Transcriber;
use crate::turn::{AbortReason, TurnMachine, Verdict};
use crate::vad::Classifier;

/// Outcome of one capture turn: an utterance ready for transcription, or the
/// reason nothing was captured. Device failures surface as `Err` from
/// `capture_turn` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingResult {
    Utterance(Vec<i16>),
    Aborted(AbortReason),
}

/// Run one capture turn against the microphone.
///
/// Plays the waiting tone until speech is detected, feeds classifier frames
/// to the state machine in strict capture order, and on a finished turn
/// trims leading low-energy audio. Cancelling the token aborts at the next
/// frame boundary.
///
/// # Errors
/// Configuration problems (caught by the classifier), a busy or missing
/// microphone, or a stream failure mid-capture. None of these are retried
/// here; each turn is a fresh attempt initiated by the caller.
pub async fn capture_turn(config: &CaptureConfig, cancel: &CancellationToken) -> Result<RecordingResult> {
    let mut classifier = Classifier::new(config)?;
    let tone = WaitingTone::start(&config.waiting_wav, config.waiting_volume);
    let (capturer, mut chunks) = Capturer::open(config.sample_rate)?;

    let mut assembler = FrameAssembler::new(classifier.frame_samples());
    let mut machine = TurnMachine::new(config);

    let verdict = loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Verdict::Aborted(AbortReason::Cancelled),
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                // The drain thread only closes the channel on stream failure.
                None => anyhow::bail!("Audio input stream failed mid-capture"),
            },
        };

        let mut terminal = None;
        for frame in assembler.push(&chunk) {
            let is_speech = classifier.classify(&frame);
            if let Some(verdict) = machine.advance(frame, is_speech) {
                terminal = Some(verdict);
                break;
            }
            if machine.heard_speech() {
                // Non-blocking; the playback thread is joined after teardown.
                tone.cancel();
            }
        }

        if let Some(verdict) = terminal {
            break verdict;
        }
    };

    // Close the receiver first: the capturer joins its drain thread on drop,
    // and the thread exits via the closed channel even with chunks queued.
    drop(chunks);
    drop(capturer);
    tone.stop();

    match verdict {
        Verdict::Finished => {
            info!("Turn finished after {:.1}s", machine.elapsed_ms() as f32 / 1000.0);
            let samples = machine.into_samples();

            if config.debug_audio {
                match dump_debug_wav(&samples, config.sample_rate) {
                    Ok(path) => info!("Raw capture saved to {}", path.display()),
                    Err(e) => warn!("Failed to save debug capture: {}", e),
                }
            }

            Ok(finish_utterance(samples, config.energy_threshold))
        }
        Verdict::Aborted(reason) => {
            debug!("Turn aborted after {:.1}s: {:?}", machine.elapsed_ms() as f32 / 1000.0, reason);
            Ok(RecordingResult::Aborted(reason))
        }
    }
}

/// Per-turn outer loop: capture, transcribe, repeat.
///
/// Ends on external cancellation or when a turn aborts with an idle timeout,
/// which is the signal that the user has walked away. Turns that end without
/// usable speech just start the next listen.
pub async fn run_chat_loop(config: &CaptureConfig, transcriber: &dyn Transcriber, cancel: &CancellationToken) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        info!("🎙 Listening...");

        match capture_turn(config, cancel).await? {
            RecordingResult::Utterance(samples) => match transcriber.transcribe(&samples, config.sample_rate).await {
                Ok(Some(text)) => info!("🗣️ You: {}", text),
                Ok(None) => debug!("Utterance produced no transcript"),
                Err(e) => warn!("Transcription failed: {}", e),
            },
            RecordingResult::Aborted(AbortReason::IdleTimeout) => {
                info!("👋 Idle timeout reached, shutting down");
                return Ok(());
            }
            RecordingResult::Aborted(AbortReason::Cancelled) => return Ok(()),
            RecordingResult::Aborted(reason) => {
                debug!("Nothing to transcribe ({:?})", reason);
            }
        }
    }
}

/// Trim the leading low-energy run and classify an all-quiet capture as a
/// no-speech abort.
fn finish_utterance(samples: Vec<i16>, energy_threshold: f32) -> RecordingResult {
    let trimmed = trim_leading_silence(&samples, energy_threshold, TRIM_WINDOW);
    if trimmed.is_empty() {
        RecordingResult::Aborted(AbortReason::NoSpeech)
    } else {
        let dropped = samples.len() - trimmed.len();
        if dropped > 0 {
            debug!("Trimmed {} leading low-energy samples", dropped);
        }
        RecordingResult::Utterance(trimmed.to_vec())
    }
}

/// Write the raw untrimmed capture to a temp WAV file for troubleshooting.
fn dump_debug_wav(samples: &[i16], sample_rate: u32) -> Result<PathBuf> {
    let stamp = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    let path = std::env::temp_dir().join(format!("turn-capture-raw-{}.wav", stamp));

    let spec = hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
    let mut writer = hound::WavWriter::create(&path, spec).with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_utterance_keeps_loud_capture() {
        let samples = vec![3000i16; TRIM_WINDOW * 2];
        let result = finish_utterance(samples.clone(), 350.0);
        assert_eq!(result, RecordingResult::Utterance(samples));
    }

    #[test]
    fn test_finish_utterance_maps_all_quiet_to_no_speech() {
        let samples = vec![5i16; TRIM_WINDOW * 2];
        let result = finish_utterance(samples, 350.0);
        assert_eq!(result, RecordingResult::Aborted(AbortReason::NoSpeech));
    }

    #[test]
    fn test_finish_utterance_trims_quiet_lead_in() {
        let mut samples = vec![5i16; TRIM_WINDOW];
        samples.extend(vec![3000i16; TRIM_WINDOW]);
        match finish_utterance(samples, 350.0) {
            RecordingResult::Utterance(kept) => assert_eq!(kept.len(), TRIM_WINDOW),
            other => panic!("expected utterance, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_dump_writes_readable_wav() {
        let samples = vec![1000i16; 1600];
        let path = dump_debug_wav(&samples, 16000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.samples::<i16>().count(), 1600);
        std::fs::remove_file(path).unwrap();
    }
}
