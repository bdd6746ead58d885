//! The overlap dedup/merge engine.
//!
//! Segments overlap by `overlap` seconds so the recognizer has context at
//! the boundary, but tokens falling inside the overlap would otherwise show
//! up twice. Each segment's output is trimmed to a half-open token window
//! `[m, n)` and appended to the per-task accumulator with timestamps shifted
//! to absolute recording time.
//!
//! Purely synchronous — no suspension points between trim and append.

use crate::asr::SegmentOutput;
use crate::text;
use crate::{Task, Transcript};

/// Merges one segment's recognizer output into the accumulator.
///
/// Window selection, in order:
/// 1. front trim: `m` = first index whose timestamp exceeds `overlap / 2`
///    (no such token → `m = len`);
/// 2. back trim: `n` = first `i ≥ 1` whose predecessor timestamp exceeds
///    `duration − overlap / 2` (no such token → `n = len`);
/// 3. the first segment of a task keeps its head: `m = 0`;
/// 4. the final segment keeps its tail: `n = len`;
/// 5. fine dedup: if the last 2 (or 1) accepted tokens equal the first 2
///    (or 1) of the window, advance `m` past them.
pub fn merge_segment(result: &mut Transcript, task: &Task, output: &SegmentOutput) {
    let duration = task.duration();
    result.duration += duration - task.overlap;
    if task.is_final {
        // The final segment has no trailing overlap to discount.
        result.duration += task.overlap;
    }

    let len = output.timestamps.len();
    let mut m = len;
    let mut n = len;

    for (i, &ts) in output.timestamps.iter().enumerate() {
        if ts > task.overlap / 2.0 {
            m = i;
            break;
        }
    }
    for i in 1..=len {
        n = i;
        if output.timestamps[i - 1] > duration - task.overlap / 2.0 {
            break;
        }
    }

    if result.timestamps.is_empty() {
        // Nothing precedes the first segment; keep its leading tokens.
        m = 0;
    }
    if task.is_final {
        n = len;
    }

    if !result.tokens.is_empty() {
        let window = window_of(&output.tokens, m, n);
        if tail_of(&result.tokens, 2) == head_of(window, 2) {
            m += 2;
        } else if tail_of(&result.tokens, 1) == head_of(window, 1) {
            m += 1;
        }
    }

    result
        .tokens
        .extend_from_slice(window_of(&output.tokens, m, n));
    result.timestamps.extend(
        window_of(&output.timestamps, m, n)
            .iter()
            .map(|ts| ts + task.offset),
    );
    result.text = text::render_tokens(&result.tokens);
}

/// `v[m..n]` with Python slice semantics: out-of-range and inverted bounds
/// yield an empty window instead of panicking.
fn window_of<T>(v: &[T], m: usize, n: usize) -> &[T] {
    let lo = m.min(v.len());
    let hi = n.min(v.len());
    if lo >= hi { &[] } else { &v[lo..hi] }
}

fn tail_of<T>(v: &[T], k: usize) -> &[T] {
    &v[v.len().saturating_sub(k)..]
}

fn head_of<T>(v: &[T], k: usize) -> &[T] {
    &v[..v.len().min(k)]
}
