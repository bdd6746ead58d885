use tracing::debug;
use voxtype_protocol::{AudioFrame, FrameError, SAMPLE_RATE, SAMPLE_WIDTH};

use crate::Task;

/// Per-connection audio accumulator that cuts the incoming stream into
/// fixed-size overlapped segments.
///
/// The cut rule: once `seg_duration + 2·seg_overlap` seconds are buffered,
/// a slice of `seg_duration + seg_overlap` seconds becomes a task while the
/// buffer only advances by `seg_duration` — the trailing `seg_overlap`
/// seconds reappear at the head of the next segment, giving the recognizer
/// decoding context across the boundary.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    /// Raw PCM bytes not yet emitted as tasks.
    chunks: Vec<u8>,
    /// Seconds of audio already emitted, i.e. the offset of `chunks[0]`.
    offset: f64,
    /// Total bytes received for the current task, for logging.
    frame_num: u64,
}

fn secs_to_bytes(secs: f64) -> usize {
    (SAMPLE_RATE as f64 * secs) as usize * SAMPLE_WIDTH
}

impl SegmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one frame and returns the tasks it completes.
    ///
    /// Non-final frames emit zero or more full segments; a final frame
    /// always emits exactly one task carrying the remaining tail (possibly
    /// empty) and resets the buffer for the next `task_id`.
    pub fn push(
        &mut self,
        frame: &AudioFrame,
        socket_id: &str,
        now: f64,
    ) -> Result<Vec<Task>, FrameError> {
        let data = frame.pcm_bytes()?;
        self.chunks.extend_from_slice(&data);
        self.frame_num += data.len() as u64;

        let seg_bytes = secs_to_bytes(frame.seg_duration);
        let slice_bytes = secs_to_bytes(frame.seg_duration + frame.seg_overlap);
        let threshold_bytes = secs_to_bytes(frame.seg_duration + 2.0 * frame.seg_overlap);

        let mut tasks = Vec::new();

        if !frame.is_final {
            while self.chunks.len() >= threshold_bytes {
                let segment = self.chunks[..slice_bytes].to_vec();
                self.chunks.drain(..seg_bytes);
                tasks.push(Task {
                    source: frame.source,
                    data: segment,
                    offset: self.offset,
                    overlap: frame.seg_overlap,
                    task_id: frame.task_id.clone(),
                    socket_id: socket_id.to_string(),
                    is_final: false,
                    time_start: frame.time_start,
                    time_submit: now,
                });
                self.offset += frame.seg_duration;
            }
        } else {
            debug!(
                socket_id,
                received_secs = self.frame_num as f64 / voxtype_protocol::BYTES_PER_SECOND as f64,
                "stream complete, flushing tail"
            );
            tasks.push(Task {
                source: frame.source,
                data: std::mem::take(&mut self.chunks),
                offset: self.offset,
                overlap: frame.seg_overlap,
                task_id: frame.task_id.clone(),
                socket_id: socket_id.to_string(),
                is_final: true,
                time_start: frame.time_start,
                time_submit: now,
            });
            self.offset = 0.0;
            self.frame_num = 0;
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxtype_protocol::{BYTES_PER_SECOND, Source, encode_pcm};

    fn frame(samples: &[f32], is_final: bool) -> AudioFrame {
        AudioFrame {
            task_id: "task-1".into(),
            seg_duration: 15.0,
            seg_overlap: 2.0,
            is_final,
            time_start: 100.0,
            time_frame: 100.0,
            source: Source::Mic,
            data: encode_pcm(samples),
        }
    }

    /// 40 s at 15/2 cuts at [0,17), [15,32), final [30,40) regardless of
    /// how the stream is framed.
    #[test]
    fn forty_seconds_in_odd_frames() {
        let mut buffer = SegmentBuffer::new();
        let mut tasks = Vec::new();

        // Frame sizes deliberately not divisors of anything: 0.7 s each,
        // 40 / 0.7 leaves a ragged tail.
        let total = 40 * SAMPLE_RATE as usize;
        let step = (0.7 * SAMPLE_RATE as f64) as usize;
        let mut sent = 0;
        while sent < total {
            let n = step.min(total - sent);
            let samples = vec![0.0f32; n];
            tasks.extend(buffer.push(&frame(&samples, false), "sock", 0.0).unwrap());
            sent += n;
        }
        tasks.extend(buffer.push(&frame(&[], true), "sock", 0.0).unwrap());

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].data.len(), 17 * BYTES_PER_SECOND);
        assert_eq!(tasks[1].data.len(), 17 * BYTES_PER_SECOND);
        assert_eq!(tasks[2].data.len(), 10 * BYTES_PER_SECOND);
        assert_eq!(tasks[0].offset, 0.0);
        assert_eq!(tasks[1].offset, 15.0);
        assert_eq!(tasks[2].offset, 30.0);
        assert!(!tasks[0].is_final);
        assert!(!tasks[1].is_final);
        assert!(tasks[2].is_final);
    }

    /// A tail shorter than the threshold is flushed by the final frame as
    /// exactly one task.
    #[test]
    fn final_flush_of_short_tail() {
        let mut buffer = SegmentBuffer::new();
        let samples = vec![0.0f32; 3 * SAMPLE_RATE as usize];
        let tasks = buffer.push(&frame(&samples, false), "sock", 0.0).unwrap();
        assert!(tasks.is_empty());

        let tasks = buffer.push(&frame(&[], true), "sock", 0.0).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_final);
        assert_eq!(tasks[0].data.len(), 3 * BYTES_PER_SECOND);
        assert_eq!(tasks[0].offset, 0.0);
    }

    /// The buffer resets after a final flush; a new task starts at offset 0.
    #[test]
    fn buffer_resets_between_tasks() {
        let mut buffer = SegmentBuffer::new();
        let samples = vec![0.0f32; 20 * SAMPLE_RATE as usize];
        let first = buffer.push(&frame(&samples, false), "sock", 0.0).unwrap();
        assert_eq!(first.len(), 1);
        let flush = buffer.push(&frame(&[], true), "sock", 0.0).unwrap();
        assert_eq!(flush.len(), 1);
        assert_eq!(flush[0].offset, 15.0);

        let again = buffer.push(&frame(&samples, false), "sock", 0.0).unwrap();
        assert_eq!(again[0].offset, 0.0);
    }

    /// A final frame carrying data contributes it to the flushed tail.
    #[test]
    fn final_frame_with_payload() {
        let mut buffer = SegmentBuffer::new();
        let samples = vec![0.0f32; SAMPLE_RATE as usize];
        let tasks = buffer.push(&frame(&samples, true), "sock", 0.0).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].data.len(), BYTES_PER_SECOND);
    }
}
