use clap::Parser;
use relaychat::assembler::segment;
use relaychat::config::Config;
use relaychat::controller::{ExchangeState, ExchangeView, NullView};
use tokio_util::sync::CancellationToken;

use super::{build_controller, cancel_on_ctrl_c, open_session, resolve_conversation};
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::view::TerminalView;

#[derive(Parser)]
pub struct AskCommand {
    #[clap(help = "Message to send")]
    pub message: String,

    #[clap(long, help = "Conversation ID (or unique prefix) to continue")]
    pub conversation: Option<String>,

    #[clap(long, help = "Start a new conversation", conflicts_with = "conversation")]
    pub new: bool,

    #[clap(long, short, help = "Model to use for this and later messages")]
    pub model: Option<String>,
}

impl AskCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        let mut session = open_session(config)?;
        let mut controller = build_controller(config)?;

        if let Some(model) = &self.model {
            session.select_model(model)?;
        }
        if self.new {
            session.new_conversation()?;
        } else if let Some(id) = &self.conversation {
            let id = resolve_conversation(&session, id)?;
            session.switch_conversation(id)?;
        }

        let quit = CancellationToken::new();
        let ctrl_c = cancel_on_ctrl_c(controller.cancel_handle(), quit.clone());

        let mut terminal = TerminalView::new();
        let mut silent = NullView;
        let view: &mut dyn ExchangeView = match format {
            OutputFormat::Json => &mut silent,
            OutputFormat::Table => &mut terminal,
        };

        let outcome = tokio::select! {
            outcome = controller.send(&mut session, &self.message, view) => outcome,
            _ = quit.cancelled() => {
                eprintln!("(interrupted)");
                return Ok(());
            }
        };
        ctrl_c.abort();
        let outcome = outcome?;

        match format {
            OutputFormat::Json => {
                let segments = outcome
                    .committed
                    .as_ref()
                    .map(|m| segment(&m.content))
                    .unwrap_or_default();
                let output = serde_json::json!({
                    "state": outcome.state,
                    "conversation": outcome.conversation.map(|id| id.to_string()),
                    "model": session.selected_model().name,
                    "reply": outcome.committed.as_ref().map(|m| &m.content),
                    "segments": segments,
                    "error": outcome.error,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => match outcome.state {
                ExchangeState::Idle => println!("Nothing to send."),
                ExchangeState::Aborted => eprintln!("(cancelled)"),
                _ => {}
            },
        }

        Ok(())
    }
}
