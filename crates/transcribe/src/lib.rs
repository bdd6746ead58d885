//! Server-side transcription pipeline: segmentation, the recognizer worker,
//! and the overlap dedup/merge engine.
//!
//! Audio arrives as [`voxtype_protocol::AudioFrame`]s, is cut into fixed-size
//! overlapped segments by [`segment::SegmentBuffer`], queued to the worker
//! thread, decoded through the [`asr::Recognizer`] seam, and stitched into a
//! single monotone token/timestamp stream by [`merge`].

pub mod asr;
pub mod check_model;
pub mod config;
pub mod merge;
pub mod segment;
pub mod text;
pub mod worker;

pub use check_model::check_model;
pub use config::{EngineConfig, PuncModel, RecognizeModel};
pub use worker::{Engines, Outbound, RecognizerHandle};

use voxtype_protocol::{ResultFrame, SAMPLE_RATE, Source};

/// One segment of audio to decode. Internal to the server.
#[derive(Debug, Clone)]
pub struct Task {
    pub source: Source,
    /// Raw mono f32le PCM bytes of this segment.
    pub data: Vec<u8>,
    /// Seconds from recording start where this segment begins.
    pub offset: f64,
    /// Trailing overlap in seconds shared with the next segment.
    pub overlap: f64,
    pub task_id: String,
    /// Originating connection; must be live at processing time.
    pub socket_id: String,
    pub is_final: bool,
    pub time_start: f64,
    pub time_submit: f64,
}

impl Task {
    /// Audio length of this segment in seconds.
    pub fn duration(&self) -> f64 {
        (self.data.len() / voxtype_protocol::SAMPLE_WIDTH) as f64 / SAMPLE_RATE as f64
    }
}

/// Per-`task_id` accumulator of decoded tokens and timestamps.
///
/// Created when the first segment of a task arrives, mutated only by the
/// recognizer worker, removed when the final segment has been merged.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub task_id: String,
    pub socket_id: String,
    pub source: Source,

    /// Cumulative recognized audio length, net of overlap.
    pub duration: f64,
    pub time_start: f64,
    pub time_submit: f64,
    pub time_complete: f64,

    pub tokens: Vec<String>,
    /// Seconds from recording start, aligned with `tokens`, non-decreasing.
    pub timestamps: Vec<f64>,
    pub text: String,
    pub is_final: bool,
}

impl Transcript {
    pub fn new(task_id: String, socket_id: String, source: Source) -> Self {
        Self {
            task_id,
            socket_id,
            source,
            duration: 0.0,
            time_start: 0.0,
            time_submit: 0.0,
            time_complete: 0.0,
            tokens: Vec::new(),
            timestamps: Vec::new(),
            text: String::new(),
            is_final: false,
        }
    }

    pub fn to_frame(&self) -> ResultFrame {
        ResultFrame {
            task_id: self.task_id.clone(),
            duration: self.duration,
            time_start: self.time_start,
            time_submit: self.time_submit,
            time_complete: self.time_complete,
            tokens: self.tokens.clone(),
            timestamps: self.timestamps.clone(),
            text: self.text.clone(),
            is_final: self.is_final,
        }
    }
}
