//! Audio I/O module: microphone capture, frame assembly, energy trimming,
//! and waiting-tone playback.
//!
//! Cross-platform audio via cpal, with resampling support via rubato when a
//! device cannot run at the configured sample rate.

mod capture;
mod frame;
pub mod resampler;
mod tone;
pub mod trim;
pub mod util;

pub use capture::Capturer;
pub use frame::{AudioFrame, FrameAssembler};
pub use tone::WaitingTone;
