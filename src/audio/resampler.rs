//! Audio resampling via rubato's FFT resampler.
//!
//! Two entry points: a streaming state for the capture callback (device rate
//! down to the classifier rate) and a batch function for the waiting-tone
//! asset (asset rate up to the output device rate).

use std::sync::Arc;

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use parking_lot::Mutex;
use rubato::{Fft, FixedSync, Resampler};

/// FFT chunk size; balances quality against latency in the capture path.
const CHUNK_SIZE: usize = 1024;

/// Number of FFT sub-chunks.
const SUB_CHUNKS: usize = 2;

/// Streaming resampler state shared with the audio callback.
///
/// Accumulates callback-sized sample bursts until a full chunk is available,
/// then emits the resampled output. Holds its buffers across calls.
pub struct ResamplerState {
    resampler: Fft<f32>,
    input_buffer: Vec<f32>,
    output_buffer: Vec<f32>,
    output_frames_max: usize,
}

impl ResamplerState {
    /// Create a mono streaming resampler from `from_rate` to `to_rate`,
    /// wrapped for shared access from the capture callback.
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Arc<Mutex<Self>>> {
        let resampler = Fft::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1, FixedSync::Input)
            .context("Failed to create resampler")?;

        let output_frames_max = resampler.output_frames_max();

        Ok(Arc::new(Mutex::new(Self {
            resampler,
            input_buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            output_buffer: vec![0.0f32; output_frames_max],
            output_frames_max,
        })))
    }

    /// Feed incoming samples; returns resampled output once a full chunk has
    /// accumulated, `None` while more input is needed.
    pub fn process_samples(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        self.input_buffer.extend_from_slice(samples);

        if self.input_buffer.len() < CHUNK_SIZE {
            return None;
        }

        let chunk: Vec<f32> = self.input_buffer.drain(..CHUNK_SIZE).collect();

        let input = InterleavedSlice::new(&chunk, 1, CHUNK_SIZE).ok()?;
        let mut output = InterleavedSlice::new_mut(&mut self.output_buffer, 1, self.output_frames_max).ok()?;

        let (_, frames_written) = self.resampler.process_into_buffer(&input, &mut output, None).ok()?;

        if frames_written > 0 { Some(self.output_buffer[..frames_written].to_vec()) } else { None }
    }
}

/// Resample a whole mono buffer at once.
///
/// The output is truncated to exactly `len * to_rate / from_rate` samples;
/// the zero tail that pads the input to whole resampler chunks is discarded.
/// Only used on the waiting-tone asset, where the buffer loops anyway.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1, FixedSync::Input)
        .context("Failed to create resampler")?;

    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];

    // Pad to whole chunks, plus one zero chunk to flush the FFT latency so
    // the output always reaches `expected_len` before truncation.
    let mut input = samples.to_vec();
    input.resize((samples.len().div_ceil(CHUNK_SIZE) + 1) * CHUNK_SIZE, 0.0);

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut output = Vec::with_capacity(expected_len + output_frames_max);

    for chunk in input.chunks_exact(CHUNK_SIZE) {
        let input = InterleavedSlice::new(chunk, 1, CHUNK_SIZE).context("Failed to create input adapter")?;
        let mut out = InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input, &mut out, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    output.truncate(expected_len);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_upsampling_length_is_exact() {
        let samples = vec![0.0; 16000];
        let result = resample(&samples, 16000, 48000).unwrap();
        assert_eq!(result.len(), 48000);
    }

    #[test]
    fn test_batch_downsampling_length_is_exact() {
        let samples = vec![0.0; 48000];
        let result = resample(&samples, 48000, 16000).unwrap();
        assert_eq!(result.len(), 16000);
    }

    #[test]
    fn test_batch_partial_chunk_input_length_is_exact() {
        // 1500 samples is not a whole resampler chunk; the padding tail must
        // not leak into the output.
        let samples = vec![0.0; 1500];
        let result = resample(&samples, 16000, 48000).unwrap();
        assert_eq!(result.len(), 4500);
    }

    #[test]
    fn test_matching_rates_are_passthrough() {
        let samples = vec![0.5; 1000];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_empty_input_is_passthrough() {
        assert!(resample(&[], 16000, 48000).unwrap().is_empty());
    }

    #[test]
    fn test_streaming_state_accumulates_chunks() {
        let state = ResamplerState::new(48000, 16000).unwrap();
        let mut state = state.lock();

        // Below a full chunk: nothing comes out yet.
        assert!(state.process_samples(&[0.0; 512]).is_none());
        // Completing the chunk yields output.
        assert!(state.process_samples(&[0.0; 512]).is_some());
    }
}
