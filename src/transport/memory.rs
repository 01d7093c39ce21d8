//! In-memory scripted transport
//!
//! Replays pre-scripted turns in FIFO order, one per invocation. Used for
//! tests and for replaying recorded NDJSON streams without a network.

use super::{AgentTransport, EventStream};
use crate::error::{Result, StreamError};
use crate::types::{decode_frame, InvokeRequest, RawEvent};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One scripted turn
#[derive(Debug)]
pub enum ScriptedTurn {
    /// Open the stream and yield these items in order
    Stream(Vec<Result<RawEvent>>),
    /// Fail at submission time
    Reject(StreamError),
}

impl ScriptedTurn {
    /// Build a turn from newline-delimited JSON frames
    ///
    /// Blank lines are ignored; undecodable lines are kept as error items
    /// so the consumer sees them exactly where they occurred.
    pub fn from_ndjson(text: &str) -> Self {
        let items = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| decode_frame(line.as_bytes()))
            .collect();
        ScriptedTurn::Stream(items)
    }
}

/// Transport that replays scripted turns
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<InvokeRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn that yields the given events
    pub fn push_events(&self, events: Vec<RawEvent>) {
        self.push_turn(ScriptedTurn::Stream(events.into_iter().map(Ok).collect()));
    }

    /// Queue a turn that yields the given items, errors included
    pub fn push_items(&self, items: Vec<Result<RawEvent>>) {
        self.push_turn(ScriptedTurn::Stream(items));
    }

    /// Queue a turn that fails at submission
    pub fn push_rejection(&self, error: StreamError) {
        self.push_turn(ScriptedTurn::Reject(error));
    }

    pub fn push_turn(&self, turn: ScriptedTurn) {
        lock(&self.turns).push_back(turn);
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<InvokeRequest> {
        lock(&self.requests).clone()
    }

    /// Number of turns not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.turns).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn invoke_agent(&self, request: &InvokeRequest) -> Result<EventStream> {
        lock(&self.requests).push(request.clone());

        let turn = lock(&self.turns).pop_front();
        match turn {
            Some(ScriptedTurn::Stream(items)) => {
                tracing::debug!(
                    session_id = %request.session_id,
                    items = items.len(),
                    "Scripted turn opened"
                );
                Ok(stream::iter(items).boxed())
            }
            Some(ScriptedTurn::Reject(error)) => Err(error),
            None => Err(StreamError::Invoke {
                agent_id: request.agent_id.clone(),
                reason: "no scripted turn left".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session_id: &str) -> InvokeRequest {
        InvokeRequest {
            agent_id: "AGENT".to_string(),
            agent_alias_id: "ALIAS".to_string(),
            session_id: session_id.to_string(),
            enable_trace: true,
            input_text: "ping".to_string(),
        }
    }

    #[tokio::test]
    async fn test_turns_replay_in_fifo_order() {
        let transport = ScriptedTransport::new();
        transport.push_events(vec![RawEvent::chunk("first")]);
        transport.push_events(vec![RawEvent::chunk("second"), RawEvent::chunk("!")]);
        assert_eq!(transport.remaining(), 2);

        let first: Vec<_> = transport
            .invoke_agent(&request("s"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(first.len(), 1);

        let second: Vec<_> = transport
            .invoke_agent(&request("s"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(second.len(), 2);
        assert_eq!(transport.remaining(), 0);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_and_exhaustion() {
        let transport = ScriptedTransport::new();
        transport.push_rejection(StreamError::Connection("refused".into()));

        let err = transport.invoke_agent(&request("s")).await.err().unwrap();
        assert!(matches!(err, StreamError::Connection(_)));

        let err = transport.invoke_agent(&request("s")).await.err().unwrap();
        assert!(matches!(err, StreamError::Invoke { .. }));
    }

    #[test]
    fn test_from_ndjson_keeps_positions() {
        let text = r#"
{"chunk": {"bytes": "SGk="}}
garbage
{"throttlingException": {"message": "slow"}}
"#;
        let ScriptedTurn::Stream(items) = ScriptedTurn::from_ndjson(text) else {
            panic!("expected stream");
        };
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].as_ref().unwrap_err().is_malformed_event());
        assert!(matches!(items[2], Err(StreamError::Service { .. })));
    }
}
