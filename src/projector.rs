//! Trace projection: render classified reasoning steps as UI units
//!
//! The projector keeps an append-only log of [`TraceUnit`]s, one per
//! [`TraceEvent`], in arrival order. A unit is never rewritten or removed;
//! only its expanded/collapsed display state can change.

use crate::classify::{ToolInvocation, ToolObservation, TraceEvent, TraceKind};
use serde_json::Value;
use std::fmt;

/// Body of a trace unit
///
/// Both branches are valid renderings. `Text` is what free text falls
/// back to when it does not parse as a JSON object or array.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendering {
    Structured(Value),
    Text(String),
}

impl Rendering {
    /// Render free text, keeping it structured when it is a JSON object or array
    pub fn best_effort(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Rendering::Structured(value),
            _ => Rendering::Text(text.to_string()),
        }
    }

    fn from_optional_text(text: Option<&str>) -> Self {
        Rendering::Text(text.unwrap_or_default().to_string())
    }

    fn from_optional_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Rendering::best_effort(s),
            Some(value) => Rendering::Structured(value.clone()),
            None => Rendering::Text(String::new()),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Rendering::Structured(_))
    }
}

impl fmt::Display for Rendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendering::Text(text) => f.write_str(text),
            Rendering::Structured(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{}", value),
            },
        }
    }
}

/// One collapsible unit in the rendered trace log
#[derive(Debug, Clone, PartialEq)]
pub struct TraceUnit {
    /// Position in the turn's trace log, starting at 0
    pub seq: usize,
    pub kind: TraceKind,
    pub label: String,
    pub body: Rendering,
    pub expanded: bool,
}

/// Per-turn trace log
///
/// A finished turn hands its projector to the caller through
/// [`TurnSummary::trace`](crate::session::TurnSummary), where units can
/// still be expanded or collapsed.
#[derive(Debug, Clone, Default)]
pub struct TraceProjector {
    units: Vec<TraceUnit>,
}

impl TraceProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project one event, returning the unit appended for it
    pub fn project(&mut self, event: &TraceEvent) -> &TraceUnit {
        let kind = event.kind();
        let (label, body) = render(event);
        let unit = TraceUnit {
            seq: self.units.len(),
            kind,
            label,
            body,
            expanded: default_expanded(kind),
        };

        tracing::debug!(seq = unit.seq, kind = %kind, "Trace unit projected");

        self.units.push(unit);
        &self.units[self.units.len() - 1]
    }

    /// Change the display state of a unit; returns false if `seq` is unknown
    pub fn set_expanded(&mut self, seq: usize, expanded: bool) -> bool {
        match self.units.get_mut(seq) {
            Some(unit) => {
                unit.expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Flip the display state of a unit
    pub fn toggle(&mut self, seq: usize) -> Option<bool> {
        let unit = self.units.get_mut(seq)?;
        unit.expanded = !unit.expanded;
        Some(unit.expanded)
    }

    pub fn units(&self) -> &[TraceUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Rationale is shown open; everything else starts collapsed
fn default_expanded(kind: TraceKind) -> bool {
    matches!(kind, TraceKind::Rationale)
}

fn render(event: &TraceEvent) -> (String, Rendering) {
    match event {
        TraceEvent::ModelInput { text } => (
            "🤔 thinking…".to_string(),
            text.as_deref()
                .map(Rendering::best_effort)
                .unwrap_or_else(|| Rendering::Text(String::new())),
        ),
        TraceEvent::ModelOutput { content } => (
            "💡 thoughts organized".to_string(),
            render_model_output(content.as_deref()),
        ),
        TraceEvent::Rationale { text } => (
            "✅ decided next action".to_string(),
            Rendering::from_optional_text(text.as_deref()),
        ),
        TraceEvent::ToolInvocation(invocation) => render_invocation(invocation),
        TraceEvent::ToolObservation(observation) => render_observation(observation),
    }
}

/// Model output is a JSON response; show its first text block when there is one
fn render_model_output(content: Option<&str>) -> Rendering {
    let Some(raw) = content else {
        return Rendering::Text(String::new());
    };

    let first_block = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("content").and_then(|c| c.get(0)).cloned());

    match first_block {
        Some(block) => match block.get("text").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => Rendering::Text(text.to_string()),
            _ => Rendering::Structured(block),
        },
        None => Rendering::Text(raw.to_string()),
    }
}

fn render_invocation(invocation: &ToolInvocation) -> (String, Rendering) {
    match invocation {
        ToolInvocation::SubAgentCall { agent_name, input } => (
            format!("🤖 calling sub-agent \"{}\"…", display_name(agent_name)),
            Rendering::from_optional_text(input.as_deref()),
        ),
        ToolInvocation::CodeExecution { input } => (
            "💻 executing tool code…".to_string(),
            Rendering::from_optional_value(input.as_ref()),
        ),
        ToolInvocation::KnowledgeBaseQuery { query, .. } => (
            "📖 querying knowledge base…".to_string(),
            Rendering::from_optional_text(query.as_deref()),
        ),
        ToolInvocation::ActionGroupCall {
            action_group,
            function,
            input,
        } => {
            let label = match (action_group, function) {
                (Some(group), Some(function)) => {
                    format!("⚙️ invoking action group {}/{}…", group, function)
                }
                (Some(group), None) => format!("⚙️ invoking action group {}…", group),
                _ => "⚙️ invoking action group…".to_string(),
            };
            (label, Rendering::from_optional_value(input.as_ref()))
        }
        ToolInvocation::Unclassified {
            discriminator,
            payload,
        } => unclassified(discriminator, payload),
    }
}

fn render_observation(observation: &ToolObservation) -> (String, Rendering) {
    match observation {
        ToolObservation::SubAgentCall { agent_name, output } => (
            format!("🤖 sub-agent \"{}\" answered", display_name(agent_name)),
            Rendering::from_optional_text(output.as_deref()),
        ),
        ToolObservation::CodeExecution { output } => (
            "💻 tool code finished".to_string(),
            Rendering::from_optional_value(output.as_ref()),
        ),
        ToolObservation::KnowledgeBaseQuery { references } => (
            "🔍 knowledge base results retrieved".to_string(),
            Rendering::from_optional_value(references.as_ref()),
        ),
        ToolObservation::ActionGroupCall { output } => (
            "📦 action group returned".to_string(),
            output
                .as_deref()
                .map(Rendering::best_effort)
                .unwrap_or_else(|| Rendering::Text(String::new())),
        ),
        ToolObservation::Unclassified {
            discriminator,
            payload,
        } => unclassified(discriminator, payload),
    }
}

fn unclassified(discriminator: &Option<String>, payload: &Value) -> (String, Rendering) {
    (
        format!(
            "❔ unclassified tool event ({})",
            discriminator.as_deref().unwrap_or("no type")
        ),
        Rendering::Structured(payload.clone()),
    )
}

fn display_name(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("unknown")
}
