//! cadtrail - feature-tree history for CAD documents.
//!
//! Command-line access to the snapshot history and change log written by
//! the tracker.

mod commands;

use cadtrail_core::config::Config;
use cadtrail_core::Tracker;
use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cadtrail")]
#[command(author, version, about = "Feature-tree history and rollback for CAD documents", long_about = None)]
struct Cli {
    /// Print output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the directory holding the history database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a document's snapshots
    History {
        /// Path of the CAD document
        document: PathBuf,
    },
    /// List a document's change events
    Events {
        /// Path of the CAD document
        document: PathBuf,
        /// Only events of this feature
        #[arg(short, long)]
        feature: Option<String>,
    },
    /// Show a snapshot
    Show {
        /// Snapshot ID
        id: String,
    },
    /// Compare two snapshots
    Diff {
        /// Older snapshot ID
        from: String,
        /// Newer snapshot ID
        to: String,
    },
    /// Show history statistics for a document
    Stats {
        /// Path of the CAD document
        document: PathBuf,
    },
    /// Delete a document's history
    Purge {
        /// Path of the CAD document
        document: PathBuf,
        /// Confirm deletion
        #[arg(short, long)]
        yes: bool,
    },
    /// Import legacy flat-file histories
    Migrate,
    /// Show resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let (mut config, sources) = Config::load(Some(&cwd)).await?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    init_logging(cli.verbose, config.log_level);

    let settings = config.resolve()?;
    tracing::debug!(sources = sources.len(), data_dir = %settings.data_dir.display(), "Configuration loaded");

    if let Commands::Config = cli.command {
        show_config(&settings, &sources);
        return Ok(());
    }

    let tracker = Tracker::new(settings).await?;
    let json = cli.json;

    match cli.command {
        Commands::History { document } => handle_history(&tracker, &document, json).await,
        Commands::Events { document, feature } => {
            handle_events(&tracker, &document, feature.as_deref(), json).await
        }
        Commands::Show { id } => handle_show(&tracker, &id, json).await,
        Commands::Diff { from, to } => handle_diff(&tracker, &from, &to, json).await,
        Commands::Stats { document } => handle_stats(&tracker, &document, json).await,
        Commands::Purge { document, yes } => handle_purge(&tracker, &document, yes, json).await,
        Commands::Migrate => handle_migrate(&tracker, json).await,
        Commands::Config => Ok(()),
    }
}
