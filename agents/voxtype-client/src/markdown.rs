//! Daily markdown log of captured utterances:
//! `YYYY/MM/[<kwd>-]<DD>.md` with lines `[HH:MM:SS](<relpath>) <text>`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Appends one log line for every matching log file under the working
/// directory: the plain daily log plus one per keyword the text starts
/// with.
pub fn write_entry(
    text: &str,
    time_start: f64,
    audio_path: &Path,
    keywords: &[String],
) -> anyhow::Result<()> {
    write_entry_in(Path::new("."), text, time_start, audio_path, keywords)
}

pub fn write_entry_in(
    base: &Path,
    text: &str,
    time_start: f64,
    audio_path: &Path,
    keywords: &[String],
) -> anyhow::Result<()> {
    let when = local_time(time_start);
    let folder = base
        .join(when.format("%Y").to_string())
        .join(when.format("%m").to_string());
    std::fs::create_dir_all(&folder)?;

    let day = when.format("%d").to_string();
    let clock = when.format("%H:%M:%S").to_string();

    let mut targets: Vec<(String, PathBuf)> =
        vec![(String::new(), folder.join(format!("{day}.md")))];
    for kwd in keywords {
        if !kwd.is_empty() && text.starts_with(kwd.as_str()) {
            targets.push((kwd.clone(), folder.join(format!("{kwd}-{day}.md"))));
        }
    }

    let rel = audio_path
        .strip_prefix(&folder)
        .unwrap_or(audio_path)
        .to_string_lossy()
        .replace(' ', "%20");

    for (kwd, file) in targets {
        let body = text[kwd.len()..].trim_start_matches(['，', '。', ',', '.']);
        let line = format!("[{clock}]({rel}) {body}\n\n");
        append(&file, &line)?;
    }
    Ok(())
}

fn append(path: &Path, line: &str) -> anyhow::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

pub(crate) fn local_time(epoch: f64) -> DateTime<Local> {
    DateTime::from_timestamp(epoch as i64, 0)
        .unwrap_or_default()
        .with_timezone(&Local)
}
