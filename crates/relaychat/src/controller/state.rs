use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Lifecycle of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::Aborted | ExchangeState::Failed
        )
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, ExchangeState::Sending | ExchangeState::Streaming)
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Idle => "idle",
            ExchangeState::Sending => "sending",
            ExchangeState::Streaming => "streaming",
            ExchangeState::Completed => "completed",
            ExchangeState::Aborted => "aborted",
            ExchangeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The single cancellation switch of a controller.
///
/// Clones share the same slot. A token is armed when an exchange starts and
/// cleared when it ends; triggering with nothing armed does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the in-flight exchange, if any. Returns whether one was armed.
    pub fn trigger(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Install a fresh token for a new exchange, replacing any stale one
    pub(crate) fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token.clone());
        }
        token
    }

    pub(crate) fn disarm(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
