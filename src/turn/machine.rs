//! Turn capture state machine.
//!
//! Consumes one classifier decision per frame and decides when the user has
//! started speaking, finished speaking, or never spoke at all. All timing is
//! frame-count based, so behavior is deterministic and testable without
//! real-time waits.
//!
//! Trailing silence is only measured after speech starts: a user taking a
//! long breath before speaking is charged against the idle timer, and a user
//! pausing mid-sentence is given the full trailing-silence allowance. While
//! recording, silence frames are appended along with speech frames so
//! natural pauses survive into the transcript audio.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::audio::AudioFrame;
use crate::config::CaptureConfig;

/// Why a turn ended without an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The user never spoke and the idle timeout elapsed.
    IdleTimeout,
    /// The hard duration ceiling was hit with no speech ever detected.
    MaxDurationNoSpeech,
    /// Everything captured was below the energy threshold after trimming.
    NoSpeech,
    /// The session was cancelled externally.
    Cancelled,
}

/// Terminal outcome of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Speech was captured and the turn ended normally.
    Finished,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingSpeech,
    Recording,
    Done,
}

/// Mutable state for one recording attempt. Created per turn and consumed by
/// `into_samples` once terminal.
pub struct TurnMachine {
    state: State,
    samples: Vec<i16>,
    heard_speech: bool,
    elapsed_frames: u32,
    idle_run: u32,
    silent_run: u32,
    idle_limit: u32,
    trailing_limit: u32,
    max_frames: u32,
    frame_ms: u32,
}

impl TurnMachine {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            state: State::AwaitingSpeech,
            samples: Vec::new(),
            heard_speech: false,
            elapsed_frames: 0,
            idle_run: 0,
            silent_run: 0,
            idle_limit: config.idle_timeout_frames(),
            trailing_limit: config.trailing_silence_frames(),
            max_frames: config.max_record_frames(),
            frame_ms: config.frame_ms,
        }
    }

    /// Feed the next frame and its classifier decision.
    ///
    /// Returns the terminal verdict once the turn ends, `None` while it is
    /// still in progress. Frames fed after a verdict are ignored.
    pub fn advance(&mut self, frame: AudioFrame, is_speech: bool) -> Option<Verdict> {
        if self.state == State::Done {
            return None;
        }

        self.elapsed_frames += 1;
        let at_ceiling = self.elapsed_frames >= self.max_frames;

        let mut verdict = match self.state {
            State::AwaitingSpeech => {
                if is_speech {
                    self.heard_speech = true;
                    self.silent_run = 0;
                    self.samples.extend_from_slice(&frame.samples);
                    self.state = State::Recording;
                    trace!("Speech started at frame {}", self.elapsed_frames);
                    None
                } else {
                    self.idle_run += 1;
                    if self.idle_run >= self.idle_limit { Some(Verdict::Aborted(AbortReason::IdleTimeout)) } else { None }
                }
            }
            State::Recording => {
                // Silence frames are kept so mid-sentence pauses are not cut
                // out of the utterance.
                self.samples.extend_from_slice(&frame.samples);
                if is_speech {
                    self.silent_run = 0;
                    None
                } else {
                    self.silent_run += 1;
                    if self.silent_run >= self.trailing_limit { Some(Verdict::Finished) } else { None }
                }
            }
            State::Done => unreachable!(),
        };

        // The duration ceiling overrides the per-state checks.
        if at_ceiling {
            verdict =
                Some(if self.heard_speech { Verdict::Finished } else { Verdict::Aborted(AbortReason::MaxDurationNoSpeech) });
        }

        trace!(
            frame = self.elapsed_frames,
            is_speech,
            idle_run = self.idle_run,
            silent_run = self.silent_run,
            "frame classified"
        );

        if verdict.is_some() {
            self.state = State::Done;
        }
        verdict
    }

    /// Whether any speech frame has been seen this turn.
    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// Elapsed turn duration in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_frames as u64 * self.frame_ms as u64
    }

    /// Consume the machine and return the accumulated samples, first speech
    /// frame through the final trailing run.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}
