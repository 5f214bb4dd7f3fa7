use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use relaychat::config::Config;

use super::open_session;
use crate::error::CliResult;
use crate::output::{OutputFormat, truncate_string};

#[derive(Parser)]
pub struct ModelCommand {
    #[clap(subcommand)]
    pub command: ModelSubcommand,
}

#[derive(Subcommand)]
pub enum ModelSubcommand {
    #[clap(about = "List known models")]
    List,

    #[clap(about = "Select the model used for new messages")]
    Select(SelectArgs),
}

#[derive(Parser)]
pub struct SelectArgs {
    #[clap(help = "Model name (e.g., 'openai/gpt-5')")]
    pub name: String,
}

impl ModelCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            ModelSubcommand::List => Self::list(config, format),
            ModelSubcommand::Select(args) => Self::select(config, args, format),
        }
    }

    fn list(config: &Config, format: OutputFormat) -> CliResult<()> {
        let session = open_session(config)?;
        let selected = session.selected_model().name.clone();
        let profiles = session.catalog().profiles();

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = profiles
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "name": &p.name,
                            "parameters": &p.parameters,
                            "selected": p.name == selected,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["", "Model", "Parameters"]);

                for profile in profiles {
                    let parameters = if profile.parameters.is_empty() {
                        "-".to_string()
                    } else {
                        truncate_string(&serde_json::Value::Object(profile.parameters.clone()).to_string(), 50)
                    };
                    table.add_row([
                        if profile.name == selected { "*" } else { "" }.to_string(),
                        profile.name.clone(),
                        parameters,
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }

    fn select(config: &Config, args: &SelectArgs, format: OutputFormat) -> CliResult<()> {
        let mut session = open_session(config)?;
        session.select_model(&args.name)?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "selected": &args.name });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => println!("Selected model: {}", args.name),
        }

        Ok(())
    }
}
