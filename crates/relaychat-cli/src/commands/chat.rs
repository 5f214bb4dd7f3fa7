use clap::Parser;
use relaychat::config::Config;
use relaychat::controller::{ExchangeState, RequestController};
use relaychat::session::ChatSession;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::history::print_conversations;
use super::{build_controller, cancel_on_ctrl_c, open_session, resolve_conversation};
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::view::TerminalView;

const HELP: &str = "\
Commands:
  /new             start a new conversation
  /list            list conversations
  /switch <id>     switch to a conversation
  /delete <id>     delete a conversation
  /model [name]    show or select the model
  /quit            exit (or Ctrl+D, or Ctrl+C at the prompt)
Ctrl+C cancels a reply in progress.";

#[derive(Parser)]
pub struct ChatCommand {
    #[clap(long, help = "Conversation ID (or unique prefix) to continue")]
    pub conversation: Option<String>,

    #[clap(long, help = "Start in a new conversation", conflicts_with = "conversation")]
    pub new: bool,
}

/// What the loop should do after a slash command
enum Flow {
    Continue,
    Quit,
}

impl ChatCommand {
    pub async fn execute(&self, config: &Config) -> CliResult<()> {
        let mut session = open_session(config)?;
        let mut controller = build_controller(config)?;

        if self.new {
            session.new_conversation()?;
        } else if let Some(id) = &self.conversation {
            let id = resolve_conversation(&session, id)?;
            session.switch_conversation(id)?;
        }

        println!(
            "Chatting with {} (type /help for commands)",
            session.selected_model().name
        );
        if let Some(active) = session.active() {
            println!("Conversation: {}", active.title);
        }

        let quit = CancellationToken::new();
        let ctrl_c = cancel_on_ctrl_c(controller.cancel_handle(), quit.clone());
        let result = chat_loop(&mut session, &mut controller, &quit).await;
        ctrl_c.abort();
        result
    }
}

async fn chat_loop(
    session: &mut ChatSession,
    controller: &mut RequestController,
    quit: &CancellationToken,
) -> CliResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = TerminalView::new();

    loop {
        print!("you> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let line = tokio::select! {
            _ = quit.cancelled() => None,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };
        let input = line.trim();

        if let Some(command) = input.strip_prefix('/') {
            match handle_command(session, command) {
                Ok(Flow::Quit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("Error: {e}"),
            }
            continue;
        }

        match controller.send(session, input, &mut view).await {
            Ok(outcome) if outcome.state == ExchangeState::Aborted => println!("(cancelled)"),
            Ok(_) => {}
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn handle_command(session: &mut ChatSession, command: &str) -> CliResult<Flow> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (name, arg) {
        ("quit" | "exit", _) => return Ok(Flow::Quit),
        ("help", _) => println!("{HELP}"),
        ("new", _) => {
            session.new_conversation()?;
            println!("Started a new conversation.");
        }
        ("list", _) => print_conversations(session, OutputFormat::Table)?,
        ("switch", Some(id)) => {
            let id = resolve_conversation(session, id)?;
            session.switch_conversation(id)?;
            if let Some(active) = session.active() {
                println!("Switched to: {}", active.title);
            }
        }
        ("delete", Some(id)) => {
            let id = resolve_conversation(session, id)?;
            session.delete_conversation(id)?;
            println!("Deleted conversation {id}.");
        }
        ("model", Some(model)) => {
            session.select_model(model)?;
            println!("Selected model: {model}");
        }
        ("model", None) => println!("Current model: {}", session.selected_model().name),
        _ => println!("Unknown command: /{command}\n{HELP}"),
    }

    Ok(Flow::Continue)
}
