//! Leading-silence trimming by short-window energy.
//!
//! Run once over a finished capture before it is handed to transcription.
//! The classifier decides turn boundaries; this pass only removes the quiet
//! run-up before the first word so the transcriber sees speech immediately.

/// Window size in samples for the energy scan, matching the original
/// assistant's capture chunk size.
pub const TRIM_WINDOW: usize = 1024;

/// Strip the leading run of windows whose mean absolute amplitude stays below
/// `threshold`.
///
/// Returns the suffix starting at the first window that reaches the
/// threshold. If every window is below it, the result is empty: the buffer
/// contains no usable speech. Pure, no side effects.
pub fn trim_leading_silence(samples: &[i16], threshold: f32, window: usize) -> &[i16] {
    assert!(window > 0, "trim window must be non-empty");

    let mut start = 0;
    while start < samples.len() {
        let end = (start + window).min(samples.len());
        if window_energy(&samples[start..end]) >= threshold {
            return &samples[start..];
        }
        start = end;
    }

    &[]
}

/// Mean absolute amplitude of one window.
fn window_energy(window: &[i16]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f64 = window.iter().map(|&s| (s as f64).abs()).sum();
    (sum / window.len() as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(len: usize) -> Vec<i16> {
        vec![2000; len]
    }

    fn quiet(len: usize) -> Vec<i16> {
        vec![10; len]
    }

    #[test]
    fn test_all_loud_buffer_unchanged() {
        // Every window above threshold: the buffer comes back whole.
        let samples = loud(TRIM_WINDOW * 3);
        let trimmed = trim_leading_silence(&samples, 350.0, TRIM_WINDOW);
        assert_eq!(trimmed, samples.as_slice());
    }

    #[test]
    fn test_all_quiet_buffer_empties() {
        let samples = quiet(TRIM_WINDOW * 3);
        let trimmed = trim_leading_silence(&samples, 350.0, TRIM_WINDOW);
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_leading_quiet_windows_removed() {
        let mut samples = quiet(TRIM_WINDOW * 2);
        samples.extend(loud(TRIM_WINDOW * 2));
        let trimmed = trim_leading_silence(&samples, 350.0, TRIM_WINDOW);
        assert_eq!(trimmed.len(), TRIM_WINDOW * 2);
        assert_eq!(trimmed[0], 2000);
    }

    #[test]
    fn test_quiet_interior_is_kept() {
        // Only the leading run is trimmed; pauses after speech survive.
        let mut samples = quiet(TRIM_WINDOW);
        samples.extend(loud(TRIM_WINDOW));
        samples.extend(quiet(TRIM_WINDOW));
        let trimmed = trim_leading_silence(&samples, 350.0, TRIM_WINDOW);
        assert_eq!(trimmed.len(), TRIM_WINDOW * 2);
    }

    #[test]
    fn test_partial_tail_window() {
        // A loud partial window at the end still rescues the buffer.
        let mut samples = quiet(TRIM_WINDOW);
        samples.extend(loud(100));
        let trimmed = trim_leading_silence(&samples, 350.0, TRIM_WINDOW);
        assert_eq!(trimmed.len(), 100);
    }

    #[test]
    fn test_empty_input() {
        assert!(trim_leading_silence(&[], 350.0, TRIM_WINDOW).is_empty());
    }
}
