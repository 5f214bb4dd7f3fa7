//! Request controller: drives one exchange from send to a terminal state
//!
//! ```text
//! Idle -> Sending -> Streaming -> { Completed | Aborted | Failed } -> Idle
//! ```
//!
//! Whatever path an exchange takes, `send` leaves the controller idle with
//! input re-enabled and the cancel switch cleared.

mod state;
mod transport;
mod view;

pub use state::{CancelHandle, ExchangeState};
pub use transport::{ChatRequest, ChatTransport, HttpTransport, OutboundMessage};
pub use view::{ExchangeView, NullView};

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{AssembledMessage, MessageAssembler};
use crate::conversation::{ChatMessage, ConversationId};
use crate::decoder::{Framing, TokenStream};
use crate::error::{RelayChatError, Result};
use crate::session::ChatSession;

/// Prefix of the reply synthesized when an exchange fails
pub const DIAGNOSTIC_PREFIX: &str = "Sorry, I ran into a problem: ";

/// Result of one `send`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    /// Terminal state reached; `Idle` when the input was blank and nothing was sent
    pub state: ExchangeState,
    /// Conversation the exchange ran in
    pub conversation: Option<ConversationId>,
    /// Reply committed to the conversation, if any
    pub committed: Option<ChatMessage>,
    /// Failure description for `Failed` exchanges
    pub error: Option<String>,
}

impl ExchangeOutcome {
    fn skipped() -> Self {
        Self {
            state: ExchangeState::Idle,
            conversation: None,
            committed: None,
            error: None,
        }
    }
}

/// How the streaming phase ended
enum Ending {
    Completed,
    Aborted,
    Failed(RelayChatError),
}

pub struct RequestController {
    transport: Arc<dyn ChatTransport>,
    framing: Framing,
    cancel: CancelHandle,
    state: ExchangeState,
}

impl RequestController {
    pub fn new(transport: Arc<dyn ChatTransport>, framing: Framing) -> Self {
        Self {
            transport,
            framing,
            cancel: CancelHandle::new(),
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Handle to the cancel switch, usable from another task while `send` runs
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one exchange for `input` in the session's active conversation.
    ///
    /// Dropping the returned future mid-exchange still leaves the controller
    /// idle and the conversation free of its placeholder.
    pub async fn send(
        &mut self,
        session: &mut ChatSession,
        input: &str,
        view: &mut dyn ExchangeView,
    ) -> Result<ExchangeOutcome> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(ExchangeOutcome::skipped());
        }

        let token = self.cancel.arm();
        self.state = ExchangeState::Sending;
        view.set_input_enabled(false);

        let mut exchange = Exchange {
            controller: self,
            session,
            view,
            open: None,
        };
        exchange.run(text, &token).await
    }

    async fn stream_reply(
        &mut self,
        request: &ChatRequest,
        view: &mut dyn ExchangeView,
        token: &CancellationToken,
        assembler: &mut MessageAssembler,
    ) -> Ending {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ending::Aborted,
            opened = self.transport.open(request) => opened,
        };

        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => return Ending::Failed(e),
        };
        self.state = ExchangeState::Streaming;

        let mut tokens = TokenStream::new(bytes, self.framing);
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ending::Aborted,
                next = tokens.next() => next,
            };

            match next {
                Some(Ok(piece)) => {
                    assembler.push(&piece);
                    view.update_live(assembler.text());
                }
                Some(Err(e)) => return Ending::Failed(e),
                None => {
                    if tokens.skipped_lines() > 0 {
                        debug!(skipped = tokens.skipped_lines(), "Skipped malformed stream lines");
                    }
                    return Ending::Completed;
                }
            }
        }
    }
}

fn non_empty(message: AssembledMessage) -> Option<AssembledMessage> {
    if message.text.is_empty() {
        None
    } else {
        Some(message)
    }
}

/// One in-flight exchange. Dropping it, whether on completion or because the
/// `send` future was abandoned, settles the controller back to idle.
struct Exchange<'a> {
    controller: &'a mut RequestController,
    session: &'a mut ChatSession,
    view: &'a mut dyn ExchangeView,
    /// Conversation still holding this exchange's placeholder
    open: Option<ConversationId>,
}

impl Exchange<'_> {
    async fn run(&mut self, text: &str, token: &CancellationToken) -> Result<ExchangeOutcome> {
        let id = self.session.begin_exchange(text)?;
        self.open = Some(id);
        self.view.show_pending();

        let mut assembler = MessageAssembler::new();
        let ending = match self.session.build_request(id) {
            Ok(request) => {
                info!(model = %request.model, conversation = %id, "Sending message");
                self.controller
                    .stream_reply(&request, &mut *self.view, token, &mut assembler)
                    .await
            }
            Err(e) => Ending::Failed(e),
        };

        let (state, reply, error) = match ending {
            Ending::Completed => {
                debug!(tokens = assembler.token_count(), "Exchange completed");
                (ExchangeState::Completed, non_empty(assembler.finish()), None)
            }
            Ending::Aborted => {
                info!(tokens = assembler.token_count(), "Exchange cancelled");
                (ExchangeState::Aborted, non_empty(assembler.finish()), None)
            }
            Ending::Failed(e) => {
                warn!(tokens = assembler.token_count(), "Exchange failed: {e}");
                let reply = if assembler.is_empty() {
                    AssembledMessage::from_text(format!("{DIAGNOSTIC_PREFIX}{e}"))
                } else {
                    assembler.finish()
                };
                (ExchangeState::Failed, Some(reply), Some(e.to_string()))
            }
        };
        self.controller.state = state;

        // Uncommitted paths leave `open` set so the drop discards the placeholder
        let committed = match reply {
            Some(reply) => match self.session.commit_reply(id, &reply.text) {
                Ok(message) => {
                    self.open = None;
                    self.view.show_final(&message, &reply.segments);
                    Some(message)
                }
                Err(e) => {
                    warn!("Failed to commit reply: {e}");
                    return Err(e);
                }
            },
            None => None,
        };

        Ok(ExchangeOutcome {
            state,
            conversation: Some(id),
            committed,
            error,
        })
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.open.take() {
            if let Err(e) = self.session.discard_placeholder(id) {
                warn!("Failed to discard placeholder: {e}");
            }
            self.view.clear_pending();
        }

        self.controller.cancel.disarm();
        self.controller.state = ExchangeState::Idle;
        self.view.set_input_enabled(true);
    }
}
