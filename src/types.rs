//! Core types for the a3s-agent-stream engine
//!
//! Wire types use camelCase JSON serialization, matching the agent
//! runtime's JSON rendering of its event stream.

use crate::error::{Result, StreamError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

/// A single conversation message
///
/// Immutable once created; the session log only ever appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a human-authored message
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Create an assistant-authored message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Parameters for one agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub enable_trace: bool,
    pub input_text: String,
}

/// One unit of the remote event stream
///
/// Exactly one of the two envelope shapes. Consumed once by the
/// classifier and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawEvent {
    /// Agent-internal reasoning and tool-use telemetry
    Trace(TracePart),
    /// A fragment of the final answer text
    Chunk(PayloadPart),
}

impl RawEvent {
    /// Build a chunk envelope from answer text
    pub fn chunk(text: impl Into<String>) -> Self {
        RawEvent::Chunk(PayloadPart {
            bytes: Bytes::from(text.into()),
        })
    }

    /// Build a trace envelope around an orchestration trace body
    pub fn orchestration(orchestration_trace: serde_json::Value) -> Self {
        RawEvent::Trace(TracePart {
            agent_id: None,
            session_id: None,
            trace: Some(TraceBody {
                orchestration_trace: Some(orchestration_trace),
                other: serde_json::Map::new(),
            }),
            orchestration_trace: None,
        })
    }
}

/// Trace envelope
///
/// The runtime nests the trace body one level (`trace.trace.orchestrationTrace`);
/// the flattened form (`trace.orchestrationTrace`) is accepted as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_trace: Option<serde_json::Value>,
}

impl TracePart {
    /// The orchestration trace body, in either nesting
    pub fn orchestration(&self) -> Option<&serde_json::Value> {
        self.trace
            .as_ref()
            .and_then(|t| t.orchestration_trace.as_ref())
            .or(self.orchestration_trace.as_ref())
    }

    /// Names of non-orchestration trace kinds carried by this envelope
    pub fn other_kinds(&self) -> Vec<&str> {
        self.trace
            .as_ref()
            .map(|t| t.other.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Inner trace body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_trace: Option<serde_json::Value>,

    /// Pre/post-processing, guardrail and failure traces
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Chunk envelope
///
/// `bytes` is base64 on the wire and raw UTF-8 in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadPart {
    #[serde(with = "base64_bytes")]
    pub bytes: Bytes,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Decode one JSON stream frame
///
/// Exception frames (`{"throttlingException": {...}}`) become
/// `StreamError::Service`; anything that is neither a trace nor a chunk
/// envelope becomes `StreamError::MalformedEvent`.
pub fn decode_frame(frame: &[u8]) -> Result<RawEvent> {
    let value: serde_json::Value = serde_json::from_slice(frame)
        .map_err(|e| StreamError::MalformedEvent(format!("not JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| StreamError::MalformedEvent("frame is not an object".to_string()))?;

    if object.len() != 1 {
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        return Err(StreamError::MalformedEvent(format!(
            "expected exactly one member, found {:?}",
            keys
        )));
    }

    let (name, body) = object
        .iter()
        .next()
        .ok_or_else(|| StreamError::MalformedEvent("empty frame".to_string()))?;

    match name.as_str() {
        "trace" | "chunk" => serde_json::from_value::<RawEvent>(value.clone())
            .map_err(|e| StreamError::MalformedEvent(format!("bad {} envelope: {}", name, e))),
        code if code.ends_with("Exception") => Err(StreamError::Service {
            code: code.to_string(),
            message: body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(StreamError::MalformedEvent(format!(
            "unknown envelope '{}'",
            other
        ))),
    }
}
