//! Agent transport trait: the core abstraction for agent runtimes
//!
//! A transport issues one invocation per turn and returns the turn's
//! ordered event stream. Backends: an in-memory scripted transport for
//! tests and replays, and an HTTP transport for a streaming gateway.

use crate::error::Result;
use crate::types::{InvokeRequest, RawEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod http;
pub mod memory;

/// Ordered stream of raw events for one turn
///
/// An `Err(StreamError::MalformedEvent)` item affects only that frame;
/// any other error ends the turn.
pub type EventStream = BoxStream<'static, Result<RawEvent>>;

/// Core trait for agent runtimes
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Invoke the agent for one turn
    ///
    /// Each call opens a new, independent stream; nothing is buffered or
    /// merged across calls.
    async fn invoke_agent(&self, request: &InvokeRequest) -> Result<EventStream>;

    /// Transport name (e.g., "http", "scripted")
    fn name(&self) -> &str;
}
