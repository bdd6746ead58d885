use std::path::Path;

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{Recognizer, SegmentOutput};

/// Local whisper.cpp engine via whisper-rs, configured for token-level
/// timestamps so the overlap dedup has per-token positions to trim on.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    language: Option<String>,
    num_threads: i32,
}

impl WhisperRecognizer {
    /// Loads a GGML Whisper model from disk. Heavy — call once, on the
    /// worker thread.
    pub fn new(
        model_path: &Path,
        language: Option<String>,
        num_threads: i32,
    ) -> anyhow::Result<Self> {
        let path = model_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("model path is not valid UTF-8"))?;
        info!(model = %model_path.display(), "loading whisper model");
        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("failed to load whisper model '{path}': {e}"))?;
        info!("whisper model loaded");
        Ok(Self {
            ctx,
            language,
            num_threads,
        })
    }
}

impl Recognizer for WhisperRecognizer {
    fn decode(&self, samples: &[f32]) -> anyhow::Result<SegmentOutput> {
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("failed to create whisper state: {e}"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.num_threads);
        if let Some(ref lang) = self.language {
            params.set_language(Some(lang));
        } else {
            params.set_detect_language(true);
        }
        params.set_translate(false);
        params.set_token_timestamps(true);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);

        state
            .full(params, samples)
            .map_err(|e| anyhow::anyhow!("whisper decode failed: {e}"))?;

        let mut output = SegmentOutput::default();
        let n_segments = state.full_n_segments();
        for s in 0..n_segments {
            let n_tokens = state.full_n_tokens(s).unwrap_or(0);
            for t in 0..n_tokens {
                let token = match state.full_get_token_text(s, t) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                // Whisper's special tokens ([_BEG_], language tags, ...) are
                // not transcript content.
                if token.starts_with("[_") || token.starts_with("<|") {
                    continue;
                }
                let data = state
                    .full_get_token_data(s, t)
                    .map_err(|e| anyhow::anyhow!("token data unavailable: {e}"))?;
                // t0 is in 10 ms units relative to this segment.
                output.tokens.push(token);
                output.timestamps.push(data.t0 as f64 / 100.0);
            }
        }

        debug!(tokens = output.tokens.len(), "whisper decode complete");
        Ok(output)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}
