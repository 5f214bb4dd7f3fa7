pub mod commands;
pub mod error;
pub mod output;
pub mod view;

pub use commands::{AskCommand, ChatCommand, HistoryCommand, ModelCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, render_segments, truncate_string};
pub use view::TerminalView;
