//! Configuration module for the capture pipeline.
//!
//! Provides CLI argument parsing with environment-variable fallbacks.

#[allow(clippy::module_inception)]
mod config;

pub use config::CaptureConfig;
