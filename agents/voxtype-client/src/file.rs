//! File transcription: decode through ffmpeg, stream in 60-second chunks,
//! collect the final transcript into sidecar files.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use uuid::Uuid;
use voxtype_protocol::{AudioFrame, BYTES_PER_SECOND, ResultFrame, Source, encode_pcm_bytes};

use crate::config::ClientConfig;
use crate::net::{self, WsSink, WsSource};
use crate::{now_epoch, srt};

/// Upload window. Independent of the server-side segment length.
const CHUNK_SECS: usize = 60;
const CHUNK_BYTES: usize = BYTES_PER_SECOND * CHUNK_SECS;

pub async fn transcribe_files(files: &[PathBuf], config: &ClientConfig) -> anyhow::Result<()> {
    for file in files {
        transcribe_one(file, config)
            .await
            .with_context(|| format!("failed to transcribe '{}'", file.display()))?;
    }
    Ok(())
}

async fn transcribe_one(file: &Path, config: &ClientConfig) -> anyhow::Result<()> {
    anyhow::ensure!(file.exists(), "file does not exist");

    let (mut sink, stream) = net::connect(&config.server_url)
        .await
        .context("cannot reach the server")?;

    let data = decode_media(file).await?;
    let audio_secs = data.len() as f64 / BYTES_PER_SECOND as f64;
    let task_id = Uuid::new_v4().to_string();
    info!(
        file = %file.display(),
        audio_secs = format!("{audio_secs:.2}"),
        %task_id,
        "transcribing"
    );

    let (sent, received) = tokio::join!(
        send_chunks(&mut sink, &data, &task_id, config),
        receive_results(stream),
    );
    sent?;
    let final_result = received?;

    write_sidecars(file, &final_result)?;
    info!(
        elapsed = format!("{:.2}s", final_result.time_complete - final_result.time_start),
        text = %final_result.text,
        "transcription complete"
    );
    Ok(())
}

/// Decodes any input media to raw mono f32le PCM at 16 kHz.
async fn decode_media(file: &Path) -> anyhow::Result<Vec<u8>> {
    let output = tokio::process::Command::new("ffmpeg")
        .arg("-i")
        .arg(file)
        .args(["-f", "f32le", "-ac", "1", "-ar", "16000", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .context("failed to run ffmpeg (is it installed?)")?;
    anyhow::ensure!(
        output.status.success(),
        "ffmpeg could not decode '{}'",
        file.display()
    );
    anyhow::ensure!(
        !output.stdout.is_empty(),
        "no audio decoded from '{}'",
        file.display()
    );
    Ok(output.stdout)
}

/// 60-second windows over the decoded stream; the last one is final. Empty
/// input still produces one final chunk so the server closes the task.
pub fn chunk_spans(len: usize) -> Vec<(Range<usize>, bool)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    loop {
        let end = (offset + CHUNK_BYTES).min(len);
        let is_final = end == len;
        spans.push((offset..end, is_final));
        if is_final {
            break;
        }
        offset = end;
    }
    spans
}

async fn send_chunks(
    sink: &mut WsSink,
    data: &[u8],
    task_id: &str,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    let time_start = now_epoch();
    for (span, is_final) in chunk_spans(data.len()) {
        let frame = AudioFrame {
            task_id: task_id.to_string(),
            seg_duration: config.file_seg_duration,
            seg_overlap: config.file_seg_overlap,
            is_final,
            time_start,
            time_frame: now_epoch(),
            source: Source::File,
            data: encode_pcm_bytes(&data[span.clone()]),
        };
        sink.send(Message::text(frame.to_json())).await?;
        debug!(
            sent_secs = span.end / BYTES_PER_SECOND,
            is_final, "chunk sent"
        );
    }
    Ok(())
}

/// Consumes progress results until the final one arrives.
async fn receive_results(mut stream: WsSource) -> anyhow::Result<ResultFrame> {
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                let frame = ResultFrame::from_json(text.as_str())
                    .map_err(|e| anyhow::anyhow!("unreadable result frame: {e}"))?;
                if frame.is_final {
                    return Ok(frame);
                }
                info!(
                    progress = format!("{:.2}s", frame.duration),
                    "transcription progress"
                );
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    anyhow::bail!("connection closed before the final result")
}

/// Writes `<stem>.merge.txt`, `<stem>.txt`, `<stem>.json` and `<stem>.srt`
/// next to the input file.
pub fn write_sidecars(file: &Path, result: &ResultFrame) -> anyhow::Result<()> {
    std::fs::write(file.with_extension("merge.txt"), &result.text)?;

    // Sentence punctuation becomes line breaks in the plain-text variant.
    let split: String = result
        .text
        .chars()
        .map(|c| if "，。？".contains(c) { '\n' } else { c })
        .collect();
    std::fs::write(file.with_extension("txt"), split)?;

    let json = serde_json::json!({
        "timestamps": result.timestamps,
        "tokens": result.tokens,
    });
    std::fs::write(file.with_extension("json"), serde_json::to_string(&json)?)?;

    srt::write_srt(
        &file.with_extension("srt"),
        &result.tokens,
        &result.timestamps,
    )?;
    Ok(())
}
