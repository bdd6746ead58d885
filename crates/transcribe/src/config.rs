use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which speech engine the worker loads, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognizeModel {
    /// HTTP collaborator exposing `POST /decode`. The default: the model
    /// process runs elsewhere and this server only does the streaming,
    /// segmentation and dedup work.
    Remote { endpoint: String },
    /// Local whisper.cpp model with token-level timestamps. Requires the
    /// `whisper` cargo feature.
    Whisper {
        model: PathBuf,
        /// ISO 639-1 hint, None = auto-detect.
        #[serde(default)]
        language: Option<String>,
        #[serde(default = "default_num_threads")]
        num_threads: i32,
    },
}

fn default_num_threads() -> i32 {
    4
}

/// The punctuation / text-normalization collaborator. Nullable — `None`
/// disables punctuation restoration and number normalization entirely.
///
/// One endpoint serves both passes: `POST /punctuate` and `POST /normalize`,
/// each with the contract `{"text": ...} → {"text": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PuncModel {
    Remote { endpoint: String },
}

/// Process-wide engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_recognize_model")]
    pub recognize_model: RecognizeModel,
    #[serde(default)]
    pub punc_model: Option<PuncModel>,
    /// Apply Chinese-number inverse text normalization on final text.
    #[serde(default = "default_true")]
    pub format_num: bool,
    /// Apply the punctuation model on final text.
    #[serde(default = "default_true")]
    pub format_punc: bool,
    /// Apply CJK/ASCII spacing normalization on final text.
    #[serde(default = "default_true")]
    pub format_spell: bool,
}

fn default_true() -> bool {
    true
}

fn default_recognize_model() -> RecognizeModel {
    RecognizeModel::Remote {
        endpoint: "http://127.0.0.1:6017".to_string(),
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recognize_model: default_recognize_model(),
            punc_model: None,
            format_num: true,
            format_punc: true,
            format_spell: true,
        }
    }
}

/// The final-text post-processing switches, split out so the worker can be
/// driven by tests without a full engine config.
#[derive(Debug, Clone, Copy)]
pub struct FormatFlags {
    pub num: bool,
    pub punc: bool,
    pub spell: bool,
}

impl EngineConfig {
    pub fn format_flags(&self) -> FormatFlags {
        FormatFlags {
            num: self.format_num,
            punc: self.format_punc,
            spell: self.format_spell,
        }
    }
}
