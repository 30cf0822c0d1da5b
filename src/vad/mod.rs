//! Voice activity detection using the WebRTC VAD engine.
//!
//! Classifies fixed-duration audio frames as speech or silence.

mod classifier;

pub use classifier::{Aggressiveness, Classifier, VadError};
