pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "cmp")]
#[command(about = "cmp - Command-line console for the Consent Management Platform")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Login, logout and session status")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Show the list pages the console knows")]
    Pages,

    #[command(about = "Fetch one page of a list")]
    List(commands::list::ListArgs),

    #[command(about = "Page through a list interactively with live search")]
    Browse(commands::browse::BrowseArgs),

    #[command(about = "Check what the current session may open")]
    Access(commands::access::AccessArgs),

    #[command(about = "Upload a file with progress reporting")]
    Upload(commands::upload::UploadArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Pages => commands::list::pages(output_format),
        Commands::List(args) => commands::list::handle(args, output_format).await,
        Commands::Browse(args) => commands::browse::handle(args, output_format).await,
        Commands::Access(args) => commands::access::handle(args, output_format).await,
        Commands::Upload(args) => commands::upload::handle(args, output_format).await,
    }
}
