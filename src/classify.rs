//! Event classification: turn raw stream envelopes into typed events
//!
//! The classifier is the only place that looks at the loosely-typed
//! envelope. Everything downstream works on [`ClassifiedEvent`].
//!
//! A single orchestration trace may carry several sub-fields at once
//! (model input, model output, rationale, tool invocation, observation).
//! Each present sub-field yields its own [`TraceEvent`], in that fixed
//! order. Missing or mistyped optional fields become `None`, never an error.

use crate::types::RawEvent;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Observation type that closes every turn; it carries the answer, which
/// also arrives as chunks
const FINISH_OBSERVATION: &str = "FINISH";

/// Tool subtype, read from the `invocationType` / `type` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SubAgentCall,
    CodeExecution,
    KnowledgeBaseQuery,
    ActionGroupCall,
}

impl ToolKind {
    /// Map a runtime discriminator to a known tool kind
    pub fn from_discriminator(discriminator: &str) -> Option<Self> {
        match discriminator {
            "AGENT_COLLABORATOR" => Some(ToolKind::SubAgentCall),
            "ACTION_GROUP_CODE_INTERPRETER" => Some(ToolKind::CodeExecution),
            "KNOWLEDGE_BASE" => Some(ToolKind::KnowledgeBaseQuery),
            "ACTION_GROUP" => Some(ToolKind::ActionGroupCall),
            _ => None,
        }
    }
}

/// A tool invocation requested by the agent
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    SubAgentCall {
        agent_name: Option<String>,
        input: Option<String>,
    },
    CodeExecution {
        input: Option<Value>,
    },
    KnowledgeBaseQuery {
        knowledge_base_id: Option<String>,
        query: Option<String>,
    },
    ActionGroupCall {
        action_group: Option<String>,
        function: Option<String>,
        input: Option<Value>,
    },
    /// Discriminator missing or not one of the known kinds
    Unclassified {
        discriminator: Option<String>,
        payload: Value,
    },
}

impl ToolInvocation {
    /// The known tool kind, if any
    pub fn kind(&self) -> Option<ToolKind> {
        match self {
            ToolInvocation::SubAgentCall { .. } => Some(ToolKind::SubAgentCall),
            ToolInvocation::CodeExecution { .. } => Some(ToolKind::CodeExecution),
            ToolInvocation::KnowledgeBaseQuery { .. } => Some(ToolKind::KnowledgeBaseQuery),
            ToolInvocation::ActionGroupCall { .. } => Some(ToolKind::ActionGroupCall),
            ToolInvocation::Unclassified { .. } => None,
        }
    }
}

/// The observed result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolObservation {
    SubAgentCall {
        agent_name: Option<String>,
        output: Option<String>,
    },
    CodeExecution {
        output: Option<Value>,
    },
    KnowledgeBaseQuery {
        references: Option<Value>,
    },
    ActionGroupCall {
        output: Option<String>,
    },
    /// Discriminator missing or not one of the known kinds
    Unclassified {
        discriminator: Option<String>,
        payload: Value,
    },
}

impl ToolObservation {
    /// The known tool kind, if any
    pub fn kind(&self) -> Option<ToolKind> {
        match self {
            ToolObservation::SubAgentCall { .. } => Some(ToolKind::SubAgentCall),
            ToolObservation::CodeExecution { .. } => Some(ToolKind::CodeExecution),
            ToolObservation::KnowledgeBaseQuery { .. } => Some(ToolKind::KnowledgeBaseQuery),
            ToolObservation::ActionGroupCall { .. } => Some(ToolKind::ActionGroupCall),
            ToolObservation::Unclassified { .. } => None,
        }
    }
}

/// One classified reasoning step
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// Prompt text sent to the foundation model
    ModelInput { text: Option<String> },
    /// Raw response content returned by the foundation model
    ModelOutput { content: Option<String> },
    /// The agent's stated reason for its next action
    Rationale { text: Option<String> },
    ToolInvocation(ToolInvocation),
    ToolObservation(ToolObservation),
}

/// Tag of a [`TraceEvent`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    ModelInput,
    ModelOutput,
    Rationale,
    ToolInvocation(Option<ToolKind>),
    ToolObservation(Option<ToolKind>),
}

impl TraceEvent {
    pub fn kind(&self) -> TraceKind {
        match self {
            TraceEvent::ModelInput { .. } => TraceKind::ModelInput,
            TraceEvent::ModelOutput { .. } => TraceKind::ModelOutput,
            TraceEvent::Rationale { .. } => TraceKind::Rationale,
            TraceEvent::ToolInvocation(inv) => TraceKind::ToolInvocation(inv.kind()),
            TraceEvent::ToolObservation(obs) => TraceKind::ToolObservation(obs.kind()),
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceKind::ModelInput => write!(f, "model_input"),
            TraceKind::ModelOutput => write!(f, "model_output"),
            TraceKind::Rationale => write!(f, "rationale"),
            TraceKind::ToolInvocation(kind) => write!(f, "tool_invocation:{}", kind_name(*kind)),
            TraceKind::ToolObservation(kind) => {
                write!(f, "tool_observation:{}", kind_name(*kind))
            }
        }
    }
}

fn kind_name(kind: Option<ToolKind>) -> &'static str {
    match kind {
        Some(ToolKind::SubAgentCall) => "sub_agent",
        Some(ToolKind::CodeExecution) => "code",
        Some(ToolKind::KnowledgeBaseQuery) => "knowledge_base",
        Some(ToolKind::ActionGroupCall) => "action_group",
        None => "unclassified",
    }
}

/// A fragment of the final answer, still as raw bytes
///
/// Decoding is left to the aggregator so that characters split across
/// chunk boundaries survive intact.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerChunk {
    pub bytes: Bytes,
}

impl AnswerChunk {
    /// Lossy UTF-8 view of this fragment alone
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Output of classification
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedEvent {
    Trace(TraceEvent),
    Answer(AnswerChunk),
}

/// Classify one raw event
///
/// A chunk envelope yields exactly one `Answer`. A trace envelope yields
/// one `Trace` per orchestration sub-field present, possibly none.
pub fn classify(event: RawEvent) -> Vec<ClassifiedEvent> {
    match event {
        RawEvent::Chunk(part) => vec![ClassifiedEvent::Answer(AnswerChunk { bytes: part.bytes })],
        RawEvent::Trace(part) => match part.orchestration() {
            Some(orchestration) => classify_orchestration(orchestration)
                .into_iter()
                .map(ClassifiedEvent::Trace)
                .collect(),
            None => {
                tracing::debug!(
                    kinds = ?part.other_kinds(),
                    "Trace envelope without orchestration trace"
                );
                Vec::new()
            }
        },
    }
}

/// Classify the sub-fields of an orchestration trace body
pub fn classify_orchestration(trace: &Value) -> Vec<TraceEvent> {
    let mut events = Vec::new();

    if let Some(input) = trace.get("modelInvocationInput") {
        events.push(TraceEvent::ModelInput {
            text: str_at(input, &["text"]),
        });
    }

    if let Some(output) = trace.get("modelInvocationOutput") {
        events.push(TraceEvent::ModelOutput {
            content: str_at(output, &["rawResponse", "content"]),
        });
    }

    if let Some(rationale) = trace.get("rationale") {
        events.push(TraceEvent::Rationale {
            text: str_at(rationale, &["text"]),
        });
    }

    if let Some(invocation) = trace.get("invocationInput") {
        events.push(TraceEvent::ToolInvocation(classify_invocation(invocation)));
    }

    if let Some(observation) = trace.get("observation") {
        if str_at(observation, &["type"]).as_deref() == Some(FINISH_OBSERVATION) {
            tracing::debug!("Final-response observation dropped");
        } else {
            events.push(TraceEvent::ToolObservation(classify_observation(observation)));
        }
    }

    events
}

fn classify_invocation(invocation: &Value) -> ToolInvocation {
    let discriminator = str_at(invocation, &["invocationType"]);

    match discriminator.as_deref().and_then(ToolKind::from_discriminator) {
        Some(ToolKind::SubAgentCall) => {
            let call = typed::<CollaboratorInput>(invocation, "agentCollaboratorInvocationInput");
            ToolInvocation::SubAgentCall {
                agent_name: call.agent_collaborator_name,
                input: call.input.and_then(|i| i.text),
            }
        }
        Some(ToolKind::CodeExecution) => ToolInvocation::CodeExecution {
            input: invocation.get("codeInterpreterInvocationInput").cloned(),
        },
        Some(ToolKind::KnowledgeBaseQuery) => {
            let lookup = typed::<KnowledgeBaseLookupInput>(invocation, "knowledgeBaseLookupInput");
            ToolInvocation::KnowledgeBaseQuery {
                knowledge_base_id: lookup.knowledge_base_id,
                query: lookup.text,
            }
        }
        Some(ToolKind::ActionGroupCall) => {
            let input = invocation.get("actionGroupInvocationInput");
            ToolInvocation::ActionGroupCall {
                action_group: input.and_then(|i| str_at(i, &["actionGroupName"])),
                function: input.and_then(|i| str_at(i, &["function"])),
                input: input.cloned(),
            }
        }
        None => {
            tracing::debug!(discriminator = ?discriminator, "Unclassified tool invocation");
            ToolInvocation::Unclassified {
                discriminator,
                payload: invocation.clone(),
            }
        }
    }
}

fn classify_observation(observation: &Value) -> ToolObservation {
    let discriminator = str_at(observation, &["type"]);

    match discriminator.as_deref().and_then(ToolKind::from_discriminator) {
        Some(ToolKind::SubAgentCall) => {
            let out = typed::<CollaboratorOutput>(observation, "agentCollaboratorInvocationOutput");
            ToolObservation::SubAgentCall {
                agent_name: out.agent_collaborator_name,
                output: out.output.and_then(|o| o.text),
            }
        }
        Some(ToolKind::CodeExecution) => ToolObservation::CodeExecution {
            output: observation.get("codeInterpreterInvocationOutput").cloned(),
        },
        Some(ToolKind::KnowledgeBaseQuery) => ToolObservation::KnowledgeBaseQuery {
            references: observation
                .get("knowledgeBaseLookupOutput")
                .and_then(|o| o.get("retrievedReferences"))
                .cloned(),
        },
        Some(ToolKind::ActionGroupCall) => ToolObservation::ActionGroupCall {
            output: str_at(observation, &["actionGroupInvocationOutput", "text"]),
        },
        None => {
            tracing::debug!(discriminator = ?discriminator, "Unclassified tool observation");
            ToolObservation::Unclassified {
                discriminator,
                payload: observation.clone(),
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextPayload {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollaboratorInput {
    #[serde(default)]
    agent_collaborator_name: Option<String>,
    #[serde(default)]
    input: Option<TextPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollaboratorOutput {
    #[serde(default)]
    agent_collaborator_name: Option<String>,
    #[serde(default)]
    output: Option<TextPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseLookupInput {
    #[serde(default)]
    knowledge_base_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Deserialize `parent[field]` into `T`, defaulting on absence or mismatch
fn typed<T: for<'de> Deserialize<'de> + Default>(parent: &Value, field: &str) -> T {
    parent
        .get(field)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// String at a nested path, if every step exists and the leaf is a string
fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}
