//! Speech-to-text collaborator boundary.
//!
//! Transcription itself lives outside this crate; the pipeline only hands a
//! finished mono 16-bit buffer across this trait and takes back a transcript
//! string, without interpreting it further.

use anyhow::Result;
use async_trait::async_trait;

/// External transcription service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a finished utterance.
    ///
    /// Returns `Ok(None)` when the audio produced no usable transcript;
    /// `Err` signals a transcription failure the caller may log and skip.
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<Option<String>>;
}

/// Placeholder used when no transcription backend is wired up: reports the
/// utterance length and produces no transcript. Lets the capture pipeline
/// run standalone as a microphone / turn-taking check.
pub struct NullTranscriber;

#[async_trait]
impl Transcriber for NullTranscriber {
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<Option<String>> {
        tracing::info!("Captured utterance: {:.2}s of audio (no transcription backend configured)", samples.len() as f32 / sample_rate as f32);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_transcriber_returns_no_transcript() {
        let transcriber = NullTranscriber;
        let result = transcriber.transcribe(&[0i16; 16000], 16000).await.unwrap();
        assert!(result.is_none());
    }
}
