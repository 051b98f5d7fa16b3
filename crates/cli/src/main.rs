use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libreria_app::bootstrap::{self, StoreKind};

#[derive(Debug, Parser)]
#[command(name = "libreria", version, about = "Book catalogue service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Keep books in process memory instead of MongoDB
        #[arg(long)]
        in_memory: bool,
    },
    /// Bulk load a CSV file into the collection
    Load {
        /// CSV file to read; defaults to `ingest.csv_path`
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Check the datastore is reachable
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = libreria_kernel::settings::Settings::load()
        .with_context(|| "failed to load libreria settings")?;
    libreria_telemetry::init(&settings.telemetry)?;

    tracing::debug!(env = ?settings.environment, command = ?cli.command, "libreria cli");

    match cli.command {
        Command::Serve { in_memory } => {
            let kind = if in_memory {
                StoreKind::InMemory
            } else {
                StoreKind::Mongo
            };
            bootstrap::serve(&settings, kind).await
        }
        Command::Load { csv } => {
            let inserted = bootstrap::load(&settings, csv.as_deref()).await?;
            println!(
                "loaded {} books into '{}'",
                inserted, settings.database.collection
            );
            Ok(())
        }
        Command::Ping => {
            bootstrap::ping(&settings).await?;
            println!("{} is reachable", settings.database.uri);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn load_accepts_csv_override() {
        let cli = Cli::try_parse_from(["libreria", "load", "--csv", "otros.csv"]).unwrap();
        match cli.command {
            Command::Load { csv } => assert_eq!(csv, Some(PathBuf::from("otros.csv"))),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
