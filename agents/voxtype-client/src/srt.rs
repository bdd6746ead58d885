//! SRT sidecar generation from the final token/timestamp stream.

use std::fmt::Write as _;
use std::path::Path;

/// Max characters of cue text before a forced break.
const MAX_CUE_CHARS: usize = 32;

/// A silence gap this long between tokens starts a new cue.
const GAP_SECS: f64 = 2.0;

/// Display time of a trailing cue with no successor.
const TAIL_SECS: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Groups tokens into subtitle cues, breaking on sentence punctuation,
/// long silence gaps, and over-long lines.
pub fn cues_from_tokens(tokens: &[String], timestamps: &[f64]) -> Vec<Cue> {
    let mut cues: Vec<Cue> = Vec::new();
    let mut text = String::new();
    let mut glue_next = false;
    let mut start = 0.0f64;
    let mut last_ts = 0.0f64;

    let flush = |cues: &mut Vec<Cue>, text: &mut String, start: f64, end: f64| {
        let trimmed = text.trim().to_string();
        if !trimmed.is_empty() {
            cues.push(Cue {
                start,
                end,
                text: trimmed,
            });
        }
        text.clear();
    };

    for (token, &ts) in tokens.iter().zip(timestamps) {
        if text.is_empty() {
            start = ts;
        } else if ts - last_ts > GAP_SECS {
            let end = last_ts + TAIL_SECS.min(ts - last_ts);
            flush(&mut cues, &mut text, start, end);
            start = ts;
            glue_next = false;
        }

        let (body, continued) = match token.strip_suffix("@@") {
            Some(body) => (body, true),
            None => (token.as_str(), false),
        };
        if !text.is_empty() && !glue_next {
            let prev = text.chars().next_back();
            let next = body.chars().next();
            if prev.is_some_and(|c| c.is_ascii_alphanumeric())
                || next.is_some_and(|c| c.is_ascii_alphanumeric())
            {
                text.push(' ');
            }
        }
        text.push_str(body);
        glue_next = continued;
        last_ts = ts;

        let breaks = body
            .chars()
            .next_back()
            .is_some_and(|c| "，。？！,.?!；;".contains(c));
        if breaks || text.chars().count() >= MAX_CUE_CHARS {
            flush(&mut cues, &mut text, start, ts + 0.5);
            glue_next = false;
        }
    }
    flush(&mut cues, &mut text, start, last_ts + TAIL_SECS);

    // Cues must not overlap their successor.
    for i in 0..cues.len().saturating_sub(1) {
        let next_start = cues[i + 1].start;
        if cues[i].end > next_start {
            cues[i].end = next_start;
        }
    }
    cues
}

/// Writes the `.srt` sidecar.
pub fn write_srt(path: &Path, tokens: &[String], timestamps: &[f64]) -> anyhow::Result<()> {
    let cues = cues_from_tokens(tokens, timestamps);
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_time(cue.start),
            format_srt_time(cue.end)
        );
        let _ = writeln!(out, "{}\n", cue.text);
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// "HH:MM:SS,mmm"
fn format_srt_time(secs: f64) -> String {
    let total_millis = (secs.max(0.0) * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn srt_time_format() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(2.965), "00:00:02,965");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
    }

    #[test]
    fn breaks_on_sentence_punctuation() {
        let tokens = toks(&["你", "好。", "再", "见"]);
        let cues = cues_from_tokens(&tokens, &[0.5, 1.0, 2.0, 2.4]);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "你好。");
        assert_eq!(cues[1].text, "再见");
        assert!(cues[0].end <= cues[1].start);
    }

    #[test]
    fn breaks_on_long_gaps() {
        let tokens = toks(&["one", "two", "three"]);
        let cues = cues_from_tokens(&tokens, &[0.0, 0.5, 5.0]);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "one two");
        assert_eq!(cues[1].text, "three");
    }

    #[test]
    fn subword_markers_glue_tokens() {
        let tokens = toks(&["hel@@", "lo", "world"]);
        let cues = cues_from_tokens(&tokens, &[0.0, 0.2, 0.6]);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "hello world");
    }

    #[test]
    fn writes_a_parseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        write_srt(&path, &toks(&["你", "好。"]), &[0.5, 1.0]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("1\n00:00:00,500 --> "));
        assert!(content.contains("你好。"));
    }
}
