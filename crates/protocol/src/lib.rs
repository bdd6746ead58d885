//! Wire protocol shared by the voxtype server and client.
//!
//! Every WebSocket message is a single UTF-8 JSON object — there is no
//! partial framing. Clients stream [`AudioFrame`]s, the server answers with
//! [`ResultFrame`]s. Audio payloads are base64 of mono float32 little-endian
//! PCM at 16 kHz.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

/// Sample rate of the wire format. Fixed; the client resamples before sending.
pub const SAMPLE_RATE: u32 = 16_000;

/// Bytes per sample of the wire format (float32 little-endian).
pub const SAMPLE_WIDTH: usize = 4;

/// Bytes of one second of wire-format audio.
pub const BYTES_PER_SECOND: usize = SAMPLE_RATE as usize * SAMPLE_WIDTH;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Malformed JSON or a missing/ill-typed field. Fatal for the connection.
    #[error("bad frame: {0}")]
    BadFrame(String),
}

/// Where a stream originates. Affects server-side logging and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Mic,
    File,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Mic => write!(f, "mic"),
            Source::File => write!(f, "file"),
        }
    }
}

/// One client→server message carrying a slice of the audio stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Task id (uuid); all frames of one utterance/file share it.
    pub task_id: String,
    /// Segment length in seconds the server should cut at.
    pub seg_duration: f64,
    /// Trailing overlap in seconds between consecutive segments.
    pub seg_overlap: f64,
    /// Last frame of this task. The payload may be empty.
    pub is_final: bool,
    /// Epoch seconds when the recording started.
    pub time_start: f64,
    /// Epoch seconds when this frame was captured.
    pub time_frame: f64,
    pub source: Source,
    /// Base64 of mono f32le PCM @ 16 kHz. Empty on the final mic frame.
    pub data: String,
}

impl AudioFrame {
    pub fn from_json(raw: &str) -> Result<Self, FrameError> {
        serde_json::from_str(raw).map_err(|e| FrameError::BadFrame(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("AudioFrame serialization is infallible")
    }

    /// Decodes the payload to raw PCM bytes, validating sample alignment.
    pub fn pcm_bytes(&self) -> Result<Vec<u8>, FrameError> {
        decode_pcm(&self.data)
    }
}

/// One server→client message. Emitted once per processed segment with
/// `is_final = false`; the final message carries the post-processed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFrame {
    pub task_id: String,
    /// Cumulative recognized audio length in seconds, net of overlap.
    pub duration: f64,
    pub time_start: f64,
    pub time_submit: f64,
    pub time_complete: f64,
    /// Subword tokens, aligned with `timestamps`.
    pub tokens: Vec<String>,
    /// Per-token seconds from recording start; non-decreasing.
    pub timestamps: Vec<f64>,
    pub text: String,
    pub is_final: bool,
}

impl ResultFrame {
    pub fn from_json(raw: &str) -> Result<Self, FrameError> {
        serde_json::from_str(raw).map_err(|e| FrameError::BadFrame(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ResultFrame serialization is infallible")
    }
}

/// Encodes f32 samples as the wire payload.
pub fn encode_pcm(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * SAMPLE_WIDTH);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Encodes raw PCM bytes (already f32le) as the wire payload.
pub fn encode_pcm_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes a wire payload to raw PCM bytes.
pub fn decode_pcm(data: &str) -> Result<Vec<u8>, FrameError> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| FrameError::BadFrame(format!("payload is not base64: {e}")))?;
    if bytes.len() % SAMPLE_WIDTH != 0 {
        return Err(FrameError::BadFrame(format!(
            "payload length {} is not a multiple of the f32 sample width",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Reinterprets raw PCM bytes as f32 samples. Length must be sample-aligned.
pub fn samples_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
