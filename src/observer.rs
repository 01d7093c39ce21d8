//! Turn observers: the UI-update seam
//!
//! The turn driver calls the observer inline for every update and awaits
//! it before pulling the next event, so observers see updates in exactly
//! stream order.

use crate::failure::ServiceError;
use crate::projector::TraceUnit;
use crate::types::Message;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;

/// Receiver of incremental UI updates for a turn
#[async_trait]
pub trait TurnObserver: Send + Sync {
    /// A trace unit was appended to the turn's log
    async fn on_trace(&self, _unit: &TraceUnit) {}

    /// Newly revealed answer text
    async fn on_answer_delta(&self, _delta: &str) {}

    /// The turn completed and its answer was appended to the session
    async fn on_answer_complete(&self, _message: &Message) {}

    /// The turn failed with a recognized service error
    async fn on_failure(&self, _error: &ServiceError) {}
}

/// Observer that discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

#[async_trait]
impl TurnObserver for NullObserver {}

/// A recorded UI update
#[derive(Debug, Clone)]
pub enum TurnUpdate {
    Trace(TraceUnit),
    AnswerDelta(String),
    AnswerComplete(Message),
    Failure(ServiceError),
}

/// Observer that records every update in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<TurnUpdate>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates recorded so far
    pub fn updates(&self) -> Vec<TurnUpdate> {
        self.lock().clone()
    }

    /// Trace units recorded so far
    pub fn trace_units(&self) -> Vec<TraceUnit> {
        self.lock()
            .iter()
            .filter_map(|u| match u {
                TurnUpdate::Trace(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    /// Concatenation of all answer deltas
    pub fn answer_text(&self) -> String {
        self.lock()
            .iter()
            .filter_map(|u| match u {
                TurnUpdate::AnswerDelta(delta) => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TurnUpdate>> {
        self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, update: TurnUpdate) {
        self.lock().push(update);
    }
}

#[async_trait]
impl TurnObserver for RecordingObserver {
    async fn on_trace(&self, unit: &TraceUnit) {
        self.record(TurnUpdate::Trace(unit.clone()));
    }

    async fn on_answer_delta(&self, delta: &str) {
        self.record(TurnUpdate::AnswerDelta(delta.to_string()));
    }

    async fn on_answer_complete(&self, message: &Message) {
        self.record(TurnUpdate::AnswerComplete(message.clone()));
    }

    async fn on_failure(&self, error: &ServiceError) {
        self.record(TurnUpdate::Failure(error.clone()));
    }
}

/// Terminal renderer
///
/// Trace units go to stderr as collapsible blocks: a `▸` label line when
/// collapsed, a `▾` label line followed by the indented body when expanded.
/// Answer text streams to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver {
    expand_all: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self { expand_all: false }
    }

    /// Print every unit's body regardless of its default display state
    pub fn expand_all() -> Self {
        Self { expand_all: true }
    }

    /// Render a unit the way this observer prints it
    pub fn format_unit(&self, unit: &TraceUnit) -> String {
        if unit.expanded || self.expand_all {
            let body = unit.body.to_string();
            let mut out = format!("▾ {}", unit.label);
            for line in body.lines() {
                out.push_str("\n    ");
                out.push_str(line);
            }
            out
        } else {
            format!("▸ {}", unit.label)
        }
    }
}

#[async_trait]
impl TurnObserver for ConsoleObserver {
    async fn on_trace(&self, unit: &TraceUnit) {
        eprintln!("{}", self.format_unit(unit));
    }

    async fn on_answer_delta(&self, delta: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    async fn on_answer_complete(&self, _message: &Message) {
        println!();
    }

    async fn on_failure(&self, error: &ServiceError) {
        eprintln!("{}", error.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TraceKind;
    use crate::projector::Rendering;

    fn unit(expanded: bool) -> TraceUnit {
        TraceUnit {
            seq: 0,
            kind: TraceKind::Rationale,
            label: "✅ decided next action".to_string(),
            body: Rendering::Text("line one\nline two".to_string()),
            expanded,
        }
    }

    #[tokio::test]
    async fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_trace(&unit(true)).await;
        observer.on_answer_delta("Hel").await;
        observer.on_answer_delta("lo").await;
        observer.on_answer_complete(&Message::assistant("Hello")).await;

        let updates = observer.updates();
        assert_eq!(updates.len(), 4);
        assert!(matches!(updates[0], TurnUpdate::Trace(_)));
        assert!(matches!(updates[3], TurnUpdate::AnswerComplete(_)));
        assert_eq!(observer.answer_text(), "Hello");
        assert_eq!(observer.trace_units().len(), 1);
    }

    #[tokio::test]
    async fn test_null_observer_accepts_everything() {
        let observer = NullObserver;
        observer.on_trace(&unit(false)).await;
        observer.on_answer_delta("x").await;
    }

    #[test]
    fn test_console_format_collapsed_and_expanded() {
        let console = ConsoleObserver::new();
        assert_eq!(console.format_unit(&unit(false)), "▸ ✅ decided next action");
        assert_eq!(
            console.format_unit(&unit(true)),
            "▾ ✅ decided next action\n    line one\n    line two"
        );
        assert!(ConsoleObserver::expand_all()
            .format_unit(&unit(false))
            .starts_with("▾"));
    }
}
