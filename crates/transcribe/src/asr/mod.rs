pub mod remote;

#[cfg(feature = "whisper")]
pub mod whisper;

use crate::config::{PuncModel, RecognizeModel};

/// Decoded output of one audio segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentOutput {
    /// Subword tokens in decode order.
    pub tokens: Vec<String>,
    /// Per-token seconds relative to the start of this segment.
    pub timestamps: Vec<f64>,
}

/// The speech engine seam. Implementations decode one complete segment of
/// mono f32 PCM at 16 kHz into aligned tokens and timestamps.
///
/// The trait is synchronous on purpose: it is only called from the worker
/// thread, and the merge step that follows must not yield mid-segment.
pub trait Recognizer: Send {
    fn decode(&self, samples: &[f32]) -> anyhow::Result<SegmentOutput>;

    /// Human-readable engine name for logs.
    fn name(&self) -> &str;
}

/// Punctuation restoration, `text → text`. Applied to final results only.
pub trait Punctuator: Send {
    fn punctuate(&self, text: &str) -> anyhow::Result<String>;
}

/// Inverse text normalization (e.g. "一百二十三" → "123"), `text → text`.
/// Applied to final results only.
pub trait Normalizer: Send {
    fn normalize(&self, text: &str) -> anyhow::Result<String>;
}

/// Builds the configured recognizer. Heavy engines load their models here,
/// so this runs on the worker thread, once, at startup.
pub fn build_recognizer(model: &RecognizeModel) -> anyhow::Result<Box<dyn Recognizer>> {
    match model {
        RecognizeModel::Remote { endpoint } => {
            Ok(Box::new(remote::RemoteRecognizer::new(endpoint)?))
        }
        #[cfg(feature = "whisper")]
        RecognizeModel::Whisper {
            model,
            language,
            num_threads,
        } => Ok(Box::new(whisper::WhisperRecognizer::new(
            model,
            language.clone(),
            *num_threads,
        )?)),
        #[cfg(not(feature = "whisper"))]
        RecognizeModel::Whisper { .. } => {
            anyhow::bail!("this build does not include the `whisper` feature")
        }
    }
}

/// Builds the punctuation collaborator, if one is configured.
pub fn build_punctuator(
    model: Option<&PuncModel>,
) -> anyhow::Result<Option<remote::RemoteTextService>> {
    match model {
        None => Ok(None),
        Some(PuncModel::Remote { endpoint }) => {
            Ok(Some(remote::RemoteTextService::new(endpoint)?))
        }
    }
}
