//! Test utilities for relaychat - scripted transport, recording view and
//! a key-value store that fails on demand
//!
//! These let the request controller be driven end to end without a network
//! or a terminal.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::assembler::Segment;
use crate::controller::{CancelHandle, ChatRequest, ChatTransport, ExchangeView};
use crate::conversation::{ChatMessage, KeyValueStore, MemoryKvStore};
use crate::decoder::ByteStream;
use crate::error::{RelayChatError, Result};

/// One event-stream line carrying `token` as delta content
pub fn sse_line(token: &str) -> String {
    let payload = serde_json::json!({ "choices": [{ "delta": { "content": token } }] });
    format!("data: {payload}\n\n")
}

/// Event-stream terminator line
pub const SSE_DONE: &str = "data: [DONE]\n\n";

/// A piece of a scripted response body
#[derive(Debug, Clone)]
pub enum ScriptedChunk {
    Data(Bytes),
    /// Transport error mid-stream
    Error(String),
    /// Stop producing anything; the stream stays open
    Hang,
}

/// What the transport does for one `open`
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Stream(Vec<ScriptedChunk>),
    Reject { status: u16, message: String },
    Fail(String),
    /// `open` never resolves
    Hang,
}

impl ScriptedReply {
    /// Event-stream body for `tokens`, terminated by the sentinel
    pub fn event_stream(tokens: &[&str]) -> Self {
        let mut chunks: Vec<ScriptedChunk> = tokens
            .iter()
            .map(|t| ScriptedChunk::Data(Bytes::from(sse_line(t))))
            .collect();
        chunks.push(ScriptedChunk::Data(Bytes::from_static(SSE_DONE.as_bytes())));
        Self::Stream(chunks)
    }

    /// Event-stream body for `tokens` that then stalls without terminating
    pub fn event_stream_then_hang(tokens: &[&str]) -> Self {
        let mut chunks: Vec<ScriptedChunk> = tokens
            .iter()
            .map(|t| ScriptedChunk::Data(Bytes::from(sse_line(t))))
            .collect();
        chunks.push(ScriptedChunk::Hang);
        Self::Stream(chunks)
    }

    /// Event-stream body for `tokens` followed by a transport error
    pub fn event_stream_then_error(tokens: &[&str], error: &str) -> Self {
        let mut chunks: Vec<ScriptedChunk> = tokens
            .iter()
            .map(|t| ScriptedChunk::Data(Bytes::from(sse_line(t))))
            .collect();
        chunks.push(ScriptedChunk::Error(error.to_string()));
        Self::Stream(chunks)
    }

    /// Raw chunks, each its own read
    pub fn raw(parts: &[&str]) -> Self {
        Self::Stream(
            parts
                .iter()
                .map(|p| ScriptedChunk::Data(Bytes::copy_from_slice(p.as_bytes())))
                .collect(),
        )
    }
}

/// Transport that replays scripted replies in order and records requests
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

fn into_byte_stream(chunks: Vec<ScriptedChunk>) -> ByteStream {
    let mut items: Vec<Result<Bytes>> = Vec::new();
    let mut hang = false;
    for chunk in chunks {
        match chunk {
            ScriptedChunk::Data(bytes) => items.push(Ok(bytes)),
            ScriptedChunk::Error(message) => items.push(Err(RelayChatError::Transport(message))),
            ScriptedChunk::Hang => {
                hang = true;
                break;
            }
        }
    }

    let head = stream::iter(items);
    if hang {
        Box::pin(head.chain(stream::pending()))
    } else {
        Box::pin(head)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let reply = self
            .replies
            .lock()
            .map_err(|_| RelayChatError::General("script lock poisoned".to_string()))?
            .pop_front();

        match reply {
            Some(ScriptedReply::Stream(chunks)) => Ok(into_byte_stream(chunks)),
            Some(ScriptedReply::Reject { status, message }) => {
                Err(RelayChatError::UpstreamRejected { status, message })
            }
            Some(ScriptedReply::Fail(message)) => Err(RelayChatError::Transport(message)),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(RelayChatError::Transport("no scripted reply left".to_string())),
        }
    }
}

/// Everything a view was asked to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Pending,
    Live(String),
    Final {
        message: ChatMessage,
        segments: Vec<Segment>,
    },
    Cleared,
    Input(bool),
}

/// When a [`RecordingView`] pulls the cancel switch
#[derive(Debug, Clone, Copy)]
pub enum CancelTrigger {
    /// As soon as the placeholder is shown
    OnPending,
    /// After this many live updates
    AfterUpdates(usize),
}

/// View that records every call and can cancel the exchange at a set point
#[derive(Debug, Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
    cancel: Option<(CancelTrigger, CancelHandle)>,
    updates: usize,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling(handle: CancelHandle, trigger: CancelTrigger) -> Self {
        Self {
            events: Vec::new(),
            cancel: Some((trigger, handle)),
            updates: 0,
        }
    }

    pub fn live_updates(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Live(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn finals(&self) -> Vec<&ChatMessage> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Final { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Last input-enabled state the controller set
    pub fn input_enabled(&self) -> Option<bool> {
        self.events.iter().rev().find_map(|e| match e {
            ViewEvent::Input(enabled) => Some(*enabled),
            _ => None,
        })
    }
}

impl ExchangeView for RecordingView {
    fn show_pending(&mut self) {
        self.events.push(ViewEvent::Pending);
        if let Some((CancelTrigger::OnPending, handle)) = &self.cancel {
            handle.trigger();
        }
    }

    fn update_live(&mut self, text: &str) {
        self.events.push(ViewEvent::Live(text.to_string()));
        self.updates += 1;
        if let Some((CancelTrigger::AfterUpdates(n), handle)) = &self.cancel {
            if self.updates >= *n {
                handle.trigger();
            }
        }
    }

    fn show_final(&mut self, message: &ChatMessage, segments: &[Segment]) {
        self.events.push(ViewEvent::Final {
            message: message.clone(),
            segments: segments.to_vec(),
        });
    }

    fn clear_pending(&mut self) {
        self.events.push(ViewEvent::Cleared);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.events.push(ViewEvent::Input(enabled));
    }
}

/// In-memory store whose writes start failing after a set number succeed
#[derive(Debug)]
pub struct FailingKvStore {
    inner: MemoryKvStore,
    writes_left: AtomicUsize,
}

impl FailingKvStore {
    pub fn fail_after(successful_writes: usize) -> Self {
        Self {
            inner: MemoryKvStore::new(),
            writes_left: AtomicUsize::new(successful_writes),
        }
    }
}

impl KeyValueStore for FailingKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let allowed = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(RelayChatError::Store("disk full".to_string()));
        }
        self.inner.set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_line_shape() {
        assert_eq!(
            sse_line("Hi"),
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n"
        );
    }

    #[test]
    fn test_failing_store_allows_first_writes() {
        let store = FailingKvStore::fail_after(1);
        assert!(store.set("k", "1").is_ok());
        assert!(store.set("k", "2").is_err());
        assert_eq!(store.get("k").unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new([
            ScriptedReply::Fail("down".to_string()),
            ScriptedReply::raw(&["ok"]),
        ]);
        let request = ChatRequest::new(&crate::models::ModelProfile::new("m"), Vec::new());

        assert!(transport.open(&request).await.is_err());
        let mut body = transport.open(&request).await.unwrap();
        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from_static(b"ok"));
        assert!(transport.open(&request).await.is_err());
        assert_eq!(transport.requests().len(), 3);
    }
}
