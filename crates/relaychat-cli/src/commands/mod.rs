pub mod ask;
pub mod chat;
pub mod history;
pub mod model;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use model::ModelCommand;

use std::sync::Arc;

use relaychat::config::Config;
use relaychat::controller::{CancelHandle, HttpTransport, RequestController};
use relaychat::conversation::{ConversationId, FileKvStore};
use relaychat::models::ModelCatalog;
use relaychat::session::ChatSession;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, CliResult};

/// Open the persisted session described by `config`
pub fn open_session(config: &Config) -> CliResult<ChatSession> {
    let kv = FileKvStore::open(&config.store.data_dir)?;
    let session = ChatSession::open(
        Arc::new(kv),
        ModelCatalog::new(config.models.clone()),
        config.client.include_history,
    )?;
    Ok(session)
}

/// Controller talking to the configured relay
pub fn build_controller(config: &Config) -> CliResult<RequestController> {
    let transport = HttpTransport::new(&config.client)?;
    tracing::debug!("Using relay endpoint {}", transport.endpoint());
    Ok(RequestController::new(
        Arc::new(transport),
        config.client.framing,
    ))
}

/// Resolve a full id or a unique id prefix
pub fn resolve_conversation(session: &ChatSession, id: &str) -> CliResult<ConversationId> {
    if let Ok(full) = id.parse::<ConversationId>() {
        return Ok(full);
    }

    let matches: Vec<ConversationId> = session
        .conversations()
        .iter()
        .filter(|c| c.id.to_string().starts_with(id))
        .map(|c| c.id)
        .collect();

    match matches.as_slice() {
        [single] => Ok(*single),
        [] => Err(CliError::ConversationNotFound(id.to_string())),
        _ => Err(CliError::AmbiguousConversation(id.to_string())),
    }
}

/// What a Ctrl+C did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Stopped the reply in progress
    Cancelled,
    /// Nothing was in flight; the caller should exit
    Quit,
}

/// Apply one Ctrl+C: cancel the in-flight exchange, or request exit when idle
pub fn on_interrupt(handle: &CancelHandle, quit: &CancellationToken) -> Interrupt {
    if handle.trigger() {
        tracing::debug!("Cancellation requested");
        Interrupt::Cancelled
    } else {
        quit.cancel();
        Interrupt::Quit
    }
}

/// Route Ctrl+C to the cancel switch until one arrives while idle, which
/// cancels `quit` and ends the listener
pub fn cancel_on_ctrl_c(handle: CancelHandle, quit: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt(&handle, &quit) == Interrupt::Quit {
                break;
            }
        }
    })
}
