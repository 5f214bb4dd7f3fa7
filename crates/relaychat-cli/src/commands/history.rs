use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use relaychat::assembler::segment;
use relaychat::config::Config;
use relaychat::conversation::Sender;
use relaychat::session::ChatSession;

use super::{open_session, resolve_conversation};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, format_timestamp, render_segments, truncate_string};

#[derive(Parser)]
pub struct HistoryCommand {
    #[clap(subcommand)]
    pub command: HistorySubcommand,
}

#[derive(Subcommand)]
pub enum HistorySubcommand {
    #[clap(about = "List conversations, newest first")]
    List,

    #[clap(about = "Show a conversation's messages")]
    Show(ShowArgs),

    #[clap(about = "Start a new, empty conversation")]
    New,

    #[clap(about = "Delete a conversation")]
    Delete(DeleteArgs),
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Conversation ID or unique prefix (defaults to the active one)")]
    pub id: Option<String>,
}

#[derive(Parser)]
pub struct DeleteArgs {
    #[clap(help = "Conversation ID or unique prefix")]
    pub id: String,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        let mut session = open_session(config)?;

        match &self.command {
            HistorySubcommand::List => print_conversations(&session, format),
            HistorySubcommand::Show(args) => Self::show(&session, args, format),
            HistorySubcommand::New => Self::new_conversation(&mut session, format),
            HistorySubcommand::Delete(args) => Self::delete(&mut session, args, format),
        }
    }

    fn show(session: &ChatSession, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let conversation = match &args.id {
            Some(id) => {
                let id = resolve_conversation(session, id)?;
                session.conversation(id)
            }
            None => session.active(),
        }
        .ok_or(CliError::NoConversations)?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(conversation)?);
            }
            OutputFormat::Table => {
                println!("{}", conversation.title);
                println!("ID: {}", conversation.id);
                println!("Created: {}\n", format_timestamp(&conversation.created_at));

                if conversation.messages.is_empty() {
                    println!("No messages yet.");
                }
                for message in conversation.committed_messages() {
                    match message.sender {
                        Sender::User => println!("you> {}\n", message.content),
                        Sender::Ai => {
                            println!("assistant>\n{}\n", render_segments(&segment(&message.content)))
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn new_conversation(session: &mut ChatSession, format: OutputFormat) -> CliResult<()> {
        let id = session.new_conversation()?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "id": id.to_string(), "created": true });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => println!("Created conversation {id}"),
        }

        Ok(())
    }

    fn delete(session: &mut ChatSession, args: &DeleteArgs, format: OutputFormat) -> CliResult<()> {
        let id = resolve_conversation(session, &args.id)?;
        session.delete_conversation(id)?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "id": id.to_string(), "deleted": true });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => println!("Deleted conversation {id}"),
        }

        Ok(())
    }
}

pub fn print_conversations(session: &ChatSession, format: OutputFormat) -> CliResult<()> {
    let conversations = session.conversations();
    let active = session.active().map(|c| c.id);

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = conversations
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id.to_string(),
                        "title": &c.title,
                        "messages": c.messages.len(),
                        "created_at": c.created_at.to_rfc3339(),
                        "active": Some(c.id) == active,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if conversations.is_empty() {
                println!("No conversations yet.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["", "ID", "Title", "Messages", "Created"]);

            for conversation in conversations {
                table.add_row([
                    if Some(conversation.id) == active { "*" } else { "" }.to_string(),
                    conversation.id.to_string().chars().take(8).collect::<String>(),
                    truncate_string(&conversation.title, 40),
                    conversation.messages.len().to_string(),
                    format_timestamp(&conversation.created_at),
                ]);
            }

            println!("{table}");
            println!("\nTotal: {} conversations", conversations.len());
        }
    }

    Ok(())
}
