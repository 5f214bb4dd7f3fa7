//! Stream decoding: relay bytes in, ordered text tokens out
//!
//! The framing convention is chosen once per deployment (see [`Framing`]);
//! the decoder never sniffs the stream to guess it.

mod sse;
mod utf8;

pub use sse::{SseEvent, SseLineBuffer, delta_content, parse_delta_content, parse_line};
pub use utf8::Utf8Decoder;

use bytes::Bytes;
use futures::stream::Stream;
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::Result;

/// Boxed byte stream as handed over by a transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How the provider frames its streamed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// `data: {json}` lines, terminated by `data: [DONE]`
    #[default]
    EventStream,
    /// Every decoded chunk is a token as-is
    RawChunk,
}

/// Lazy, finite, non-restartable sequence of tokens decoded from a byte stream
pub struct TokenStream<S> {
    inner: S,
    framing: Framing,
    utf8: Utf8Decoder,
    lines: SseLineBuffer,
    ready: VecDeque<String>,
    finished: bool,
    saw_sentinel: bool,
    skipped: usize,
}

impl<S> TokenStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    pub fn new(inner: S, framing: Framing) -> Self {
        Self {
            inner,
            framing,
            utf8: Utf8Decoder::new(),
            lines: SseLineBuffer::new(),
            ready: VecDeque::new(),
            finished: false,
            saw_sentinel: false,
            skipped: 0,
        }
    }

    /// Whether the stream ended on the `[DONE]` sentinel rather than transport close
    pub fn ended_by_sentinel(&self) -> bool {
        self.saw_sentinel
    }

    /// Number of data lines dropped because their payload was not valid JSON
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    fn absorb(&mut self, chunk: &[u8]) {
        let text = self.utf8.decode(chunk);
        match self.framing {
            Framing::RawChunk => self.push_raw(text),
            Framing::EventStream => {
                for line in self.lines.push(&text) {
                    if self.handle_line(&line) {
                        break;
                    }
                }
            }
        }
    }

    fn drain_tail(&mut self) {
        let text = self.utf8.finish();
        match self.framing {
            Framing::RawChunk => self.push_raw(text),
            Framing::EventStream => {
                let mut tail = self.lines.push(&text);
                tail.extend(self.lines.finish());
                for line in tail {
                    if self.handle_line(&line) {
                        break;
                    }
                }
            }
        }
        self.finished = true;
    }

    fn push_raw(&mut self, text: String) {
        if !text.is_empty() {
            self.ready.push_back(text);
        }
    }

    /// Returns true once the sentinel has been seen
    fn handle_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Some(SseEvent::Done) => {
                self.saw_sentinel = true;
                self.finished = true;
                true
            }
            Some(SseEvent::Data(payload)) => {
                match serde_json::from_str::<serde_json::Value>(&payload) {
                    Ok(value) => {
                        if let Some(token) = delta_content(&value) {
                            self.ready.push_back(token);
                        }
                    }
                    Err(e) => {
                        self.skipped += 1;
                        tracing::trace!(error = %e, "Skipping malformed stream line");
                    }
                }
                false
            }
            None => false,
        }
    }
}

impl<S> Stream for TokenStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(token) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(token)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.absorb(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => this.drain_tail(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
