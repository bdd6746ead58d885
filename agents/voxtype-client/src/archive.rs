//! Captured-audio archive: `YYYY/MM/assets/(YYYYMMDD-HHMMSS)<text>.{mp3|wav}`.
//!
//! MP3 through a piped ffmpeg process when ffmpeg is installed, 16-bit WAV
//! through hound otherwise. The file is created under a placeholder name
//! while recording and renamed once the transcript is known.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;

use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

use crate::capture::CAPTURE_RATE;
use crate::markdown::local_time;

enum ArchiveWriter {
    Ffmpeg(Child),
    Wav(hound::WavWriter<std::io::BufWriter<std::fs::File>>),
}

pub struct AudioArchive {
    writer: ArchiveWriter,
}

/// Creates the archive file for a recording that started at `time_start`.
/// Returns the (placeholder) path and the writer.
pub fn create(channels: u16, time_start: f64) -> anyhow::Result<(PathBuf, AudioArchive)> {
    create_in(Path::new("."), channels, time_start)
}

pub fn create_in(
    base: &Path,
    channels: u16,
    time_start: f64,
) -> anyhow::Result<(PathBuf, AudioArchive)> {
    let when = local_time(time_start);
    let folder = base
        .join(when.format("%Y").to_string())
        .join(when.format("%m").to_string())
        .join("assets");
    std::fs::create_dir_all(&folder)?;

    let stem = format!(
        "({}){}",
        when.format("%Y%m%d-%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..6]
    );

    if ffmpeg_available() {
        let path = folder.join(format!("{stem}.mp3"));
        let rate = CAPTURE_RATE.to_string();
        let channel_count = channels.to_string();
        let child = Command::new("ffmpeg")
            .args(["-y", "-f", "f32le", "-ar", rate.as_str()])
            .args(["-ac", channel_count.as_str(), "-i", "-", "-b:a", "192k"])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to start ffmpeg")?;
        Ok((
            path,
            AudioArchive {
                writer: ArchiveWriter::Ffmpeg(child),
            },
        ))
    } else {
        let path = folder.join(format!("{stem}.wav"));
        let spec = hound::WavSpec {
            channels,
            sample_rate: CAPTURE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create '{}'", path.display()))?;
        Ok((
            path,
            AudioArchive {
                writer: ArchiveWriter::Wav(writer),
            },
        ))
    }
}

impl AudioArchive {
    /// Appends one interleaved 48 kHz block.
    pub fn write(&mut self, interleaved: &[f32]) {
        match &mut self.writer {
            ArchiveWriter::Ffmpeg(child) => {
                if let Some(stdin) = child.stdin.as_mut() {
                    let mut bytes = Vec::with_capacity(interleaved.len() * 4);
                    for sample in interleaved {
                        bytes.extend_from_slice(&sample.to_le_bytes());
                    }
                    if let Err(e) = stdin.write_all(&bytes) {
                        warn!(error = %e, "ffmpeg pipe write failed");
                    }
                }
            }
            ArchiveWriter::Wav(writer) => {
                for sample in interleaved {
                    let quantized = (sample.clamp(-1.0, 1.0) * (i16::MAX as f32)) as i16;
                    if writer.write_sample(quantized).is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Finishes the file. ffmpeg closes when its stdin does.
    pub fn finish(self) {
        match self.writer {
            ArchiveWriter::Ffmpeg(mut child) => {
                drop(child.stdin.take());
                let _ = child.wait();
            }
            ArchiveWriter::Wav(writer) => {
                if let Err(e) = writer.finalize() {
                    warn!(error = %e, "failed to finalize wav file");
                }
            }
        }
    }
}

/// Renames the placeholder file to carry the transcript prefix.
pub fn rename_audio_file(
    path: &Path,
    text: &str,
    time_start: f64,
    name_len: usize,
) -> anyhow::Result<PathBuf> {
    anyhow::ensure!(path.exists(), "audio file '{}' is gone", path.display());

    let when = local_time(time_start);
    let prefix: String = text.chars().take(name_len).collect();
    let mut stem = format!("({}){}", when.format("%Y%m%d-%H%M%S"), prefix);
    // Characters that are unsafe in file names on any supported platform.
    stem = stem.replace(['\\', '/', ':', '"', '*', '?', '<', '>', '|'], " ");

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("wav");
    let renamed = path.with_file_name(format!("{stem}.{extension}"));
    std::fs::rename(path, &renamed)
        .with_context(|| format!("failed to rename '{}'", path.display()))?;
    Ok(renamed)
}

/// Whether ffmpeg is on PATH. Checked once.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_uses_transcript_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let placeholder = dir.path().join("(20240101-120000)abc123.wav");
        std::fs::write(&placeholder, b"riff").unwrap();

        let renamed =
            rename_audio_file(&placeholder, "你好 world", 1_700_000_000.0, 20).unwrap();
        assert!(renamed.exists());
        let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("你好 world"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn rename_sanitizes_forbidden_characters() {
        let dir = tempfile::tempdir().unwrap();
        let placeholder = dir.path().join("(20240101-120000)xyz.wav");
        std::fs::write(&placeholder, b"riff").unwrap();

        let renamed =
            rename_audio_file(&placeholder, "a/b:c?d", 1_700_000_000.0, 20).unwrap();
        let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
        assert!(!name.contains('?'));
    }

    #[test]
    fn rename_truncates_long_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        let placeholder = dir.path().join("(20240101-120000)q.wav");
        std::fs::write(&placeholder, b"riff").unwrap();

        let long = "字".repeat(100);
        let renamed = rename_audio_file(&placeholder, &long, 1_700_000_000.0, 10).unwrap();
        let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.matches('字').count(), 10);
    }

    #[test]
    fn wav_archive_roundtrip() {
        // Exercises the wav writer directly; create_in picks mp3 whenever
        // ffmpeg happens to be installed.
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: CAPTURE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = dir.path().join("take.wav");
        let writer = hound::WavWriter::create(&path, spec).unwrap();
        let mut archive = AudioArchive {
            writer: ArchiveWriter::Wav(writer),
        };
        archive.write(&[0.0, 0.5, -0.5]);
        archive.finish();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0);
        assert!(samples[1] > 16_000);
        assert!(samples[2] < -16_000);
    }
}
