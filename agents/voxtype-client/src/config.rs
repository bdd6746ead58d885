use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default config file next to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "voxtype-client.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,

    /// Write each captured utterance to an archive file and a daily
    /// markdown log.
    pub save_audio: bool,
    /// Pre-trigger hold buffer in seconds: audio captured this soon after
    /// the hotkey press is cached and flushed in one piece, so the first
    /// syllables survive. A release before the threshold cancels the
    /// utterance.
    pub threshold: f64,
    /// true = paste via clipboard, false = type keystrokes.
    pub paste: bool,
    /// Restore the previous clipboard contents after pasting.
    pub restore_clip: bool,
    /// Trailing punctuation stripped from results before output.
    pub trash_punc: String,

    /// Hot-word substitution layers.
    pub hot_zh: bool,
    pub hot_en: bool,
    pub hot_rule: bool,
    pub hot_kwd: bool,

    /// Max transcript characters used in archive file names.
    pub audio_name_len: usize,

    pub mic_seg_duration: f64,
    pub mic_seg_overlap: f64,
    pub file_seg_duration: f64,
    pub file_seg_overlap: f64,

    /// Push-to-talk key, e.g. "caps_lock", "f2", "right_ctrl".
    pub hotkey: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:6016/ws".to_string(),
            save_audio: true,
            threshold: 0.3,
            paste: true,
            restore_clip: true,
            trash_punc: "，。,.".to_string(),
            hot_zh: true,
            hot_en: true,
            hot_rule: true,
            hot_kwd: true,
            audio_name_len: 20,
            mic_seg_duration: 15.0,
            mic_seg_overlap: 2.0,
            file_seg_duration: 25.0,
            file_seg_overlap: 2.0,
            hotkey: "caps_lock".to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads from `path`, from `voxtype-client.toml` in the working
    /// directory, or from the per-user config dir, whichever exists first.
    /// No file at all means the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }
        let local = Path::new(DEFAULT_CONFIG_PATH);
        if local.exists() {
            return Self::read(local);
        }
        if let Some(dirs) = directories::ProjectDirs::from("", "", "voxtype") {
            let user = dirs.config_dir().join("client.toml");
            if user.exists() {
                return Self::read(&user);
            }
        }
        Ok(Self::default())
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config '{}'", path.display()))
    }
}
