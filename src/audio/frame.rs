//! Audio frames and frame assembly.
//!
//! The capture stream delivers variable-sized chunks of f32 samples; the
//! classifier needs exact fixed-duration frames of i16 samples. The assembler
//! bridges the two, preserving arrival order and carrying leftovers across
//! chunks.

/// One fixed-duration slice of mono 16-bit samples, the unit of
/// classification. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

impl AudioFrame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Accumulates incoming f32 sample chunks and emits complete classifier
/// frames in order.
pub struct FrameAssembler {
    frame_samples: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    /// Create an assembler emitting frames of `frame_samples` samples.
    pub fn new(frame_samples: usize) -> Self {
        Self { frame_samples, pending: Vec::with_capacity(frame_samples * 2) }
    }

    /// Feed a chunk of f32 samples and drain every complete frame it yields.
    /// An incomplete tail stays buffered for the next chunk.
    pub fn push(&mut self, chunk: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend(chunk.iter().map(|&s| f32_to_i16(s)));

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let samples: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            frames.push(AudioFrame { samples });
        }
        frames
    }

    /// Number of samples currently buffered short of a full frame.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Convert one f32 sample in [-1.0, 1.0] to i16, clamping out-of-range input.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_exact_frames_in_order() {
        let mut assembler = FrameAssembler::new(4);
        let frames = assembler.push(&[0.0; 10]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 4);
        assert!(!frames[0].is_empty());
        assert_eq!(assembler.pending_len(), 2);

        // The leftover pair completes with the next chunk.
        let frames = assembler.push(&[0.0, 0.0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_order_preserved_across_chunks() {
        let mut assembler = FrameAssembler::new(3);
        let chunk: Vec<f32> = (1..=6).map(|i| i as f32 / 32767.0).collect();
        let frames = assembler.push(&chunk);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples, vec![1, 2, 3]);
        assert_eq!(frames[1].samples, vec![4, 5, 6]);
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.5), -32768);
        assert_eq!(f32_to_i16(2.0), 32767);
    }
}
