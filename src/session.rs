//! Session management and the per-turn driver
//!
//! `SessionManager` owns the agent configuration and lazily creates the
//! single conversation `Session`. Each submitted prompt becomes a `Turn`
//! whose event stream is consumed in order: trace events are projected
//! into display units, answer chunks are aggregated, and the observer is
//! notified inline before the next event is pulled.

use crate::aggregate::AnswerAggregator;
use crate::classify::{classify, ClassifiedEvent};
use crate::config::AgentConfig;
use crate::error::{Result, StreamError};
use crate::failure::{FailureClassifier, ServiceError};
use crate::observer::TurnObserver;
use crate::projector::{TraceProjector, TraceUnit};
use crate::transport::{AgentTransport, EventStream};
use crate::types::{InvokeRequest, Message, Role};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

/// One conversation with the remote agent
///
/// The id is fixed for the session's lifetime and sent with every turn.
/// The message log only ever grows.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    transport: Arc<dyn AgentTransport>,
    messages: RwLock<Vec<Message>>,
}

impl Session {
    fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            transport,
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Name of the bound transport
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Full message log in append order
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Assistant replies in append order
    pub async fn assistant_messages(&self) -> Vec<Message> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .cloned()
            .collect()
    }

    async fn append(&self, message: Message) {
        self.messages.write().await.push(message);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("transport", &self.transport.name())
            .finish()
    }
}

/// Lifecycle of a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed,
}

impl TurnState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Streaming)
                | (Submitting, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    /// Whether the turn has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Submitting => "submitting",
            TurnState::Streaming => "streaming",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn transition(turn_id: &str, state: &mut TurnState, next: TurnState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal turn transition {} -> {}",
        state,
        next
    );
    tracing::debug!(turn_id = %turn_id, from = %state, to = %next, "Turn state changed");
    *state = next;
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub turn_id: String,

    /// Full answer text; empty when no chunk arrived
    pub answer: String,

    /// The turn's trace log; display state stays adjustable after the turn
    pub trace: TraceProjector,
}

impl TurnSummary {
    /// Trace units in stream order
    pub fn units(&self) -> &[TraceUnit] {
        self.trace.units()
    }
}

/// How a turn ended
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Completed(TurnSummary),
    /// A recognized service failure; the partial answer was discarded
    Failed(ServiceError),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }
}

/// A submitted turn whose stream is ready to consume
pub struct Turn {
    id: String,
    state: TurnState,
    stream: EventStream,
    projector: TraceProjector,
    aggregator: AnswerAggregator,
}

impl Turn {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Drain the stream, driving the observer, until it ends or fails
    ///
    /// Malformed frames are skipped. Any other stream error ends the turn
    /// with nothing appended to the session.
    pub async fn consume(
        self,
        session: &Session,
        observer: &dyn TurnObserver,
    ) -> Result<TurnSummary> {
        let Turn {
            id,
            mut state,
            mut stream,
            mut projector,
            mut aggregator,
        } = self;

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) if e.is_malformed_event() => {
                    tracing::warn!(turn_id = %id, error = %e, "Skipping malformed event");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        turn_id = %id,
                        error = %e,
                        discarded_chars = aggregator.text().chars().count(),
                        "Turn stream failed"
                    );
                    transition(&id, &mut state, TurnState::Failed);
                    return Err(e);
                }
            };

            for classified in classify(event) {
                match classified {
                    ClassifiedEvent::Trace(trace) => {
                        let unit = projector.project(&trace);
                        tracing::debug!(turn_id = %id, seq = unit.seq, kind = %unit.kind, "Trace unit");
                        observer.on_trace(unit).await;
                    }
                    ClassifiedEvent::Answer(chunk) => {
                        let delta = aggregator.push(&chunk);
                        if !delta.is_empty() {
                            observer.on_answer_delta(&delta).await;
                        }
                    }
                }
            }
        }

        let chunks = aggregator.chunk_count();
        let answer = aggregator.finish();

        if chunks > 0 {
            let message = Message::assistant(answer.clone());
            session.append(message.clone()).await;
            observer.on_answer_complete(&message).await;
        }

        transition(&id, &mut state, TurnState::Completed);
        tracing::info!(
            turn_id = %id,
            session_id = %session.id(),
            chunks,
            units = projector.len(),
            "Turn completed"
        );

        Ok(TurnSummary {
            turn_id: id,
            answer,
            trace: projector,
        })
    }
}

impl fmt::Debug for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Turn")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Owns the configuration and the lazily created session
pub struct SessionManager {
    config: AgentConfig,
    transport: Arc<dyn AgentTransport>,
    session: OnceLock<Arc<Session>>,
    classifier: FailureClassifier,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish()
    }
}

impl SessionManager {
    /// Create a manager; fails if the configuration is incomplete
    pub fn new(config: AgentConfig, transport: Arc<dyn AgentTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            session: OnceLock::new(),
            classifier: FailureClassifier::new(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the session, creating it on first call
    ///
    /// Every call returns the same session.
    pub fn initialize(&self) -> Arc<Session> {
        self.session
            .get_or_init(|| {
                let session = Session::new(self.transport.clone());
                tracing::info!(
                    session_id = %session.id(),
                    agent_id = %self.config.agent_id,
                    transport = self.transport.name(),
                    "Session created"
                );
                Arc::new(session)
            })
            .clone()
    }

    /// Record the prompt and open the turn's event stream
    pub async fn submit_turn(&self, session: &Session, prompt: &str) -> Result<Turn> {
        if prompt.trim().is_empty() {
            return Err(StreamError::Invoke {
                agent_id: self.config.agent_id.clone(),
                reason: "prompt is empty".to_string(),
            });
        }

        let turn_id = uuid::Uuid::new_v4().to_string();
        let mut state = TurnState::Idle;
        transition(&turn_id, &mut state, TurnState::Submitting);

        session.append(Message::human(prompt)).await;

        let request = InvokeRequest {
            agent_id: self.config.agent_id.clone(),
            agent_alias_id: self.config.agent_alias_id.clone(),
            session_id: session.id().to_string(),
            // The trace log is built from the trace stream
            enable_trace: true,
            input_text: prompt.to_string(),
        };

        let stream = match session.transport.invoke_agent(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(turn_id = %turn_id, error = %e, "Turn submission failed");
                transition(&turn_id, &mut state, TurnState::Failed);
                return Err(e);
            }
        };

        transition(&turn_id, &mut state, TurnState::Streaming);

        Ok(Turn {
            id: turn_id,
            state,
            stream,
            projector: TraceProjector::new(),
            aggregator: AnswerAggregator::new(),
        })
    }

    /// Submit a prompt and consume its turn to the end
    ///
    /// Recognized service failures are reported to the observer and
    /// returned as `TurnOutcome::Failed`; any other error is returned
    /// unchanged.
    pub async fn run_turn(
        &self,
        session: &Session,
        prompt: &str,
        observer: &dyn TurnObserver,
    ) -> Result<TurnOutcome> {
        let result = match self.submit_turn(session, prompt).await {
            Ok(turn) => turn.consume(session, observer).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => Ok(TurnOutcome::Completed(summary)),
            Err(e) => match self.classifier.classify(e) {
                Ok(service_error) => {
                    observer.on_failure(&service_error).await;
                    Ok(TurnOutcome::Failed(service_error))
                }
                Err(e) => {
                    tracing::error!(session_id = %session.id(), error = %e, "Unhandled turn failure");
                    Err(e)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NullObserver, RecordingObserver};
    use crate::transport::memory::ScriptedTransport;
    use crate::types::RawEvent;

    fn manager(transport: Arc<ScriptedTransport>) -> SessionManager {
        SessionManager::new(AgentConfig::new("AGENT", "ALIAS"), transport).unwrap()
    }

    #[test]
    fn test_turn_state_transitions() {
        use TurnState::*;
        assert!(Idle.can_transition_to(Submitting));
        assert!(Submitting.can_transition_to(Streaming));
        assert!(Submitting.can_transition_to(Failed));
        assert!(Streaming.can_transition_to(Completed));
        assert!(Streaming.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Completed.can_transition_to(Streaming));
        assert!(!Failed.can_transition_to(Submitting));
        assert!(Completed.is_terminal());
        assert!(!Streaming.is_terminal());
    }

    #[test]
    fn test_new_validates_config() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = SessionManager::new(AgentConfig::default(), transport).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let manager = manager(Arc::new(ScriptedTransport::new()));
        let first = manager.initialize();
        let second = manager.initialize();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id(), second.id());
        assert_eq!(first.transport_name(), "scripted");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected_before_append() {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = manager(transport.clone());
        let session = manager.initialize();

        let err = manager.submit_turn(&session, "   ").await.unwrap_err();
        assert!(matches!(err, StreamError::Invoke { .. }));
        assert!(session.messages().await.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_records_prompt_and_streams() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_events(vec![RawEvent::chunk("pong")]);
        let manager = manager(transport.clone());
        let session = manager.initialize();

        let turn = manager.submit_turn(&session, "ping").await.unwrap();
        assert_eq!(turn.state(), TurnState::Streaming);

        let messages = session.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Human);

        let requests = transport.requests();
        assert_eq!(requests[0].session_id, session.id());
        assert!(requests[0].enable_trace);
        assert_eq!(requests[0].input_text, "ping");

        let summary = turn.consume(&session, &NullObserver).await.unwrap();
        assert_eq!(summary.answer, "pong");
        assert_eq!(session.assistant_messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_traces_only_appends_no_answer() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_events(vec![RawEvent::orchestration(
            serde_json::json!({"rationale": {"text": "nothing to say"}}),
        )]);
        let manager = manager(transport);
        let session = manager.initialize();
        let observer = RecordingObserver::new();

        let outcome = manager.run_turn(&session, "hi", &observer).await.unwrap();
        let TurnOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.units().len(), 1);
        assert!(summary.answer.is_empty());
        assert!(session.assistant_messages().await.is_empty());
        assert_eq!(observer.trace_units().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_discards_partial_answer() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_items(vec![
            Ok(RawEvent::chunk("partial")),
            Err(StreamError::Stream("connection reset".into())),
        ]);
        let manager = manager(transport);
        let session = manager.initialize();

        let err = manager
            .run_turn(&session, "hi", &NullObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Stream(_)));
        assert!(session.assistant_messages().await.is_empty());
        assert_eq!(session.messages().await.len(), 1);
    }
}
