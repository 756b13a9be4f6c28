use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::WatchId;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod answers;
mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "intake", about = "Watch intake wizard for the command line")]
struct Cli {
    /// Config file; defaults to ./intake.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the access token as an export line.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Check an answers file against every step without submitting.
    Validate {
        #[arg(long)]
        answers: PathBuf,
    },
    /// Run the wizard with an answers file and submit it.
    Submit {
        #[arg(long)]
        answers: PathBuf,
        /// Edit an existing watch record instead of creating one.
        #[arg(long)]
        record: Option<i64>,
        /// Resume a locally saved draft.
        #[arg(long, conflicts_with = "record")]
        draft: Option<Uuid>,
    },
    Drafts {
        #[command(subcommand)]
        command: DraftsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DraftsCommand {
    List,
    Discard { draft_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Login { email, password } => {
            commands::login(&settings, &email, &password).await?;
        }
        Command::Validate { answers } => {
            if !commands::validate(&answers)? {
                bail!("answers file has validation errors");
            }
        }
        Command::Submit {
            answers,
            record,
            draft,
        } => {
            commands::submit(&settings, &answers, record.map(WatchId), draft).await?;
        }
        Command::Drafts { command } => match command {
            DraftsCommand::List => commands::list_drafts(&settings).await?,
            DraftsCommand::Discard { draft_id } => {
                commands::discard_draft(&settings, draft_id).await?
            }
        },
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
