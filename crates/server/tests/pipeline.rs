//! End-to-end pipeline tests: a real WebSocket client streaming audio at a
//! server wired to a scripted recognizer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashSet;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use voxtype_protocol::{AudioFrame, ResultFrame, Source, encode_pcm};
use voxtype_server::build_router;
use voxtype_server::state::AppState;
use voxtype_server::ws::sender::run_result_sender;
use voxtype_server::ws::storage::SocketRegistry;
use voxtype_transcribe::asr::{Recognizer, SegmentOutput};
use voxtype_transcribe::config::FormatFlags;
use voxtype_transcribe::worker::{Engines, RecognizerHandle, spawn_with};

/// Deterministic engine stub: the output is selected by segment length in
/// samples, so test assertions do not depend on decode order.
struct LenKeyedRecognizer {
    by_len: HashMap<usize, SegmentOutput>,
    delay: Duration,
}

impl Recognizer for LenKeyedRecognizer {
    fn decode(&self, samples: &[f32]) -> anyhow::Result<SegmentOutput> {
        std::thread::sleep(self.delay);
        Ok(self.by_len.get(&samples.len()).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "len-keyed"
    }
}

fn seg_output(tokens: &[&str], timestamps: &[f64]) -> SegmentOutput {
    SegmentOutput {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        timestamps: timestamps.to_vec(),
    }
}

/// Boots a server on an ephemeral port with a scripted engine. The returned
/// handle keeps the worker alive for the duration of the test.
async fn start_server(
    by_len: HashMap<usize, SegmentOutput>,
    delay: Duration,
) -> (String, RecognizerHandle) {
    let live_sockets = Arc::new(DashSet::new());
    let holder = Mutex::new(Some(by_len));
    let handle = spawn_with(
        move || {
            Ok(Engines {
                recognizer: Box::new(LenKeyedRecognizer {
                    by_len: holder.lock().unwrap().take().unwrap(),
                    delay,
                }),
                punctuator: None,
                normalizer: None,
            })
        },
        FormatFlags {
            num: false,
            punc: false,
            spell: true,
        },
        live_sockets.clone(),
    )
    .unwrap();

    let handle = tokio::task::spawn_blocking(move || {
        handle.wait_ready().map(|_| handle)
    })
    .await
    .unwrap()
    .unwrap();

    let registry = Arc::new(SocketRegistry::new());
    let state = AppState {
        registry: registry.clone(),
        live_sockets,
        tasks: handle.tasks.clone(),
    };
    tokio::spawn(run_result_sender(registry, handle.results.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    (format!("ws://{addr}/ws"), handle)
}

async fn connect(url: &str) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let mut request = url.into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", "binary".parse().unwrap());
    let (stream, response) = connect_async(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .map(|v| v.to_str().unwrap()),
        Some("binary")
    );
    stream
}

fn frame(task_id: &str, samples: &[f32], is_final: bool) -> AudioFrame {
    AudioFrame {
        task_id: task_id.to_string(),
        seg_duration: 15.0,
        seg_overlap: 2.0,
        is_final,
        time_start: 1000.0,
        time_frame: 1000.0,
        source: Source::Mic,
        data: encode_pcm(samples),
    }
}

async fn next_result<S>(stream: &mut S) -> ResultFrame
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("timed out waiting for a result")
            .expect("stream ended while waiting for a result")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return ResultFrame::from_json(text.as_str()).unwrap();
        }
    }
}

/// 20 s of mic audio in 0.5 s frames, then the final flush: one partial
/// result for the 17 s segment, one final with the full token stream and
/// net duration 20 s.
#[tokio::test]
async fn mic_happy_path() {
    let (url, _worker) = start_server(
        HashMap::from([(17 * 16000, seg_output(&["你", "好"], &[0.3, 0.6]))]),
        Duration::ZERO,
    )
    .await;

    let mut stream = connect(&url).await;
    let block = vec![0.0f32; 8000]; // 0.5 s of silence
    for _ in 0..40 {
        stream
            .send(Message::text(frame("task-mic", &block, false).to_json()))
            .await
            .unwrap();
    }
    stream
        .send(Message::text(frame("task-mic", &[], true).to_json()))
        .await
        .unwrap();

    let partial = next_result(&mut stream).await;
    assert!(!partial.is_final);
    assert_eq!(partial.text, "你好");
    assert_eq!(partial.tokens, vec!["你", "好"]);

    let final_result = next_result(&mut stream).await;
    assert!(final_result.is_final);
    assert_eq!(final_result.text, "你好");
    assert_eq!(final_result.tokens, vec!["你", "好"]);
    assert_eq!(final_result.timestamps.len(), final_result.tokens.len());
    assert!((final_result.duration - 20.0).abs() < 1e-6);
    assert_eq!(final_result.task_id, "task-mic");
}

/// A client that drops mid-stream leaves nothing behind: its queued tasks
/// are discarded and a later client only ever sees its own task_id.
#[tokio::test]
async fn disconnect_mid_stream_does_not_leak() {
    let (url, _worker) = start_server(
        HashMap::from([
            (17 * 16000, seg_output(&["leaked"], &[2.0])),
            (16000, seg_output(&["ok"], &[0.5])),
        ]),
        Duration::from_millis(300),
    )
    .await;

    // First client: enough audio for two segments, then an abrupt drop.
    {
        let mut stream = connect(&url).await;
        let block = vec![0.0f32; 16000 * 34];
        stream
            .send(Message::text(frame("task-a", &block, false).to_json()))
            .await
            .unwrap();
        // Dropped without a close handshake.
    }

    // Give the server a moment to observe the disconnect.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut stream = connect(&url).await;
    stream
        .send(Message::text(
            frame("task-b", &vec![0.0f32; 16000], true).to_json(),
        ))
        .await
        .unwrap();

    let result = next_result(&mut stream).await;
    assert_eq!(result.task_id, "task-b");
    assert!(result.is_final);
    assert_eq!(result.tokens, vec!["ok"]);
}

/// Malformed JSON closes the connection.
#[tokio::test]
async fn bad_frame_closes_connection() {
    let (url, _worker) = start_server(HashMap::new(), Duration::ZERO).await;

    let mut stream = connect(&url).await;
    stream
        .send(Message::text("this is not a frame"))
        .await
        .unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => return true,
                _ => {}
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);
}
