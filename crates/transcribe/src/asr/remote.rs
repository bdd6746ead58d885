use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use voxtype_protocol::encode_pcm;

use super::{Normalizer, Punctuator, Recognizer, SegmentOutput};

#[derive(Serialize)]
struct DecodeRequest {
    /// Base64 of mono f32le PCM, same encoding as the wire protocol.
    data: String,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct DecodeResponse {
    tokens: Vec<String>,
    timestamps: Vec<f64>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

/// Speech engine behind an HTTP collaborator (`POST {endpoint}/decode`).
///
/// The model process runs elsewhere; this server only ships segments out and
/// aligned tokens back. Uses the blocking reqwest client because decoding is
/// driven from the worker thread.
pub struct RemoteRecognizer {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteRecognizer {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl Recognizer for RemoteRecognizer {
    fn decode(&self, samples: &[f32]) -> anyhow::Result<SegmentOutput> {
        let request = DecodeRequest {
            data: encode_pcm(samples),
            sample_rate: voxtype_protocol::SAMPLE_RATE,
        };
        let response: DecodeResponse = self
            .client
            .post(format!("{}/decode", self.endpoint))
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| anyhow::anyhow!("decode request to '{}' failed: {e}", self.endpoint))?
            .json()
            .map_err(|e| anyhow::anyhow!("decode response was not valid JSON: {e}"))?;

        if response.tokens.len() != response.timestamps.len() {
            anyhow::bail!(
                "engine returned {} tokens but {} timestamps",
                response.tokens.len(),
                response.timestamps.len()
            );
        }

        debug!(tokens = response.tokens.len(), "remote decode complete");
        Ok(SegmentOutput {
            tokens: response.tokens,
            timestamps: response.timestamps,
        })
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// The punctuation / normalization collaborator (`POST /punctuate`,
/// `POST /normalize`), both `text → text`.
pub struct RemoteTextService {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteTextService {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn post_text(&self, path: &str, text: &str) -> anyhow::Result<String> {
        let response: TextResponse = self
            .client
            .post(format!("{}/{path}", self.endpoint))
            .json(&TextRequest { text })
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| anyhow::anyhow!("{path} request to '{}' failed: {e}", self.endpoint))?
            .json()
            .map_err(|e| anyhow::anyhow!("{path} response was not valid JSON: {e}"))?;
        Ok(response.text)
    }
}

impl Punctuator for RemoteTextService {
    fn punctuate(&self, text: &str) -> anyhow::Result<String> {
        self.post_text("punctuate", text)
    }
}

impl Normalizer for RemoteTextService {
    fn normalize(&self, text: &str) -> anyhow::Result<String> {
        self.post_text("normalize", text)
    }
}
