//! # a3s-agent-stream
//!
//! Streaming session engine for a remote reasoning agent.
//!
//! ## Overview
//!
//! `a3s-agent-stream` submits a prompt to a remote agent runtime, consumes
//! the turn's event stream in order and turns it into two things: a log of
//! human-readable trace units (what the agent is thinking and which tools
//! it calls) and the final answer, revealed incrementally as chunks arrive.
//! Known service failures are mapped to user-facing remediation messages.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_agent_stream::{AgentConfig, RawEvent, RecordingObserver, SessionManager, TurnOutcome};
//! use a3s_agent_stream::transport::memory::ScriptedTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_agent_stream::Result<()> {
//! let transport = Arc::new(ScriptedTransport::new());
//! transport.push_events(vec![RawEvent::chunk("Hello, world")]);
//!
//! let manager = SessionManager::new(AgentConfig::new("AGENT", "ALIAS"), transport)?;
//! let session = manager.initialize();
//!
//! let observer = RecordingObserver::new();
//! if let TurnOutcome::Completed(summary) = manager.run_turn(&session, "ping", &observer).await? {
//!     println!("Answer: {}", summary.answer);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **scripted** - replays queued turns; for tests and recorded NDJSON streams
//! - **http** - streams newline-delimited JSON frames from an agent gateway
//!
//! ## Architecture
//!
//! - **AgentTransport** trait - opens one ordered event stream per turn
//! - **SessionManager** - owns the session and drives each turn
//! - **classify** - raw events into trace events and answer chunks
//! - **TraceProjector** - trace events into labelled, collapsible units
//! - **AnswerAggregator** - byte-exact incremental answer reassembly
//! - **FailureClassifier** - service errors into remediation messages
//! - **TurnObserver** - the UI-update seam
//! - **report** - the report-generation action group the agent can call

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod failure;
pub mod observer;
pub mod projector;
pub mod report;
pub mod session;
pub mod transport;
pub mod types;

// Re-export core types
pub use aggregate::AnswerAggregator;
pub use classify::{
    classify, AnswerChunk, ClassifiedEvent, ToolInvocation, ToolKind, ToolObservation, TraceEvent,
    TraceKind,
};
pub use config::{AgentConfig, HttpTransportConfig};
pub use error::{Result, StreamError};
pub use failure::{FailureClassifier, ServiceError, ServiceErrorCode};
pub use observer::{ConsoleObserver, NullObserver, RecordingObserver, TurnObserver, TurnUpdate};
pub use projector::{Rendering, TraceProjector, TraceUnit};
pub use session::{Session, SessionManager, Turn, TurnOutcome, TurnState, TurnSummary};
pub use transport::{AgentTransport, EventStream};
pub use types::{InvokeRequest, Message, RawEvent, Role};

// Re-export transports for convenience
pub use transport::http::HttpTransport;
pub use transport::memory::{ScriptedTransport, ScriptedTurn};
