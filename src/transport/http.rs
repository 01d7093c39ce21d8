//! HTTP streaming transport
//!
//! Posts the turn to `{endpoint}/agents/{agentId}/agentAliases/{aliasId}/sessions/{sessionId}/text`
//! and reads the response body as newline-delimited JSON frames (the JSON
//! rendering of the runtime's event stream, as relayed by a gateway).

use super::{AgentTransport, EventStream};
use crate::config::HttpTransportConfig;
use crate::error::{Result, StreamError};
use crate::types::{decode_frame, InvokeRequest, RawEvent};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Frames buffered between the reader task and the consumer
const FRAME_BUFFER: usize = 64;

/// HTTP transport for a streaming agent gateway
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Build the transport; fails if no endpoint is configured
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .ok_or_else(|| StreamError::Config("transport.endpoint is not set".to_string()))?
            .to_string();

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| StreamError::Connection(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(endpoint = %endpoint, "HTTP agent transport ready");

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// URL for one invocation
    pub fn invoke_url(&self, request: &InvokeRequest) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.endpoint, request.agent_id, request.agent_alias_id, request.session_id
        )
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn invoke_agent(&self, request: &InvokeRequest) -> Result<EventStream> {
        let url = self.invoke_url(request);
        let body = serde_json::json!({
            "inputText": request.input_text,
            "enableTrace": request.enable_trace,
        });

        let mut builder = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .json(&body);
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StreamError::Connection(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(':').next().unwrap_or(v).to_string());
            let body = response.text().await.unwrap_or_default();

            tracing::debug!(status = status.as_u16(), error_type = ?error_type, "Invocation rejected");

            return Err(match error_type {
                Some(code) => StreamError::Service {
                    code,
                    message: body,
                },
                None => StreamError::Http {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        tracing::debug!(session_id = %request.session_id, "Agent stream opened");

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let mut bytes = response.bytes_stream();

        // Reader task: split the body into frames and forward them in order.
        // It stops as soon as the consumer drops the stream.
        tokio::spawn(async move {
            let mut splitter = FrameSplitter::default();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in splitter.push(&chunk) {
                            if tx.send(decode_frame(&frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(StreamError::Stream(e.to_string()))).await;
                        return;
                    }
                }
            }

            if let Some(frame) = splitter.finish() {
                let _ = tx.send(decode_tail(&frame)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Splits a byte stream into newline-delimited frames
#[derive(Debug, Default)]
struct FrameSplitter {
    buffer: Vec<u8>,
}

impl FrameSplitter {
    /// Feed bytes, returning every frame completed by them
    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(frame) = trim_frame(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a final frame that had no trailing newline
    fn finish(self) -> Option<Vec<u8>> {
        trim_frame(&self.buffer)
    }
}

/// Decode the unterminated remainder of a body
///
/// A complete frame without a trailing newline is accepted. Anything that
/// does not decode means the connection closed mid-frame, which fails the
/// turn instead of being skipped as a malformed event.
fn decode_tail(frame: &[u8]) -> Result<RawEvent> {
    match decode_frame(frame) {
        Err(e) if e.is_malformed_event() => Err(StreamError::Stream(format!(
            "stream ended inside a frame ({} bytes): {}",
            frame.len(),
            e
        ))),
        other => other,
    }
}

fn trim_frame(line: &[u8]) -> Option<Vec<u8>> {
    let start = line.iter().position(|b| !b.is_ascii_whitespace())?;
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace())?;
    Some(line[start..=end].to_vec())
}
