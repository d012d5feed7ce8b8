use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "delve")]
#[command(about = "Delve CLI - inspect and maintain persisted research chats", long_about = None)]
struct Cli {
    /// Use this directory instead of the platform config directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage chat rooms
    Rooms {
        #[command(subcommand)]
        action: RoomsAction,
    },
    /// Manage client configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RoomsAction {
    /// List rooms grouped by last activity
    List,
    /// Show a room's messages and archived activity
    Show { id: String },
    /// Rename a room
    Rename { id: String, title: String },
    /// Delete a room
    Delete { id: String },
    /// Delete every room
    Clear {
        /// Confirm deleting everything
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = delve_infrastructure::DelvePaths::new(cli.data_dir);

    match cli.command {
        Commands::Rooms { action } => {
            let rooms = commands::rooms::open(&paths).await?;
            match action {
                RoomsAction::List => commands::rooms::list(&rooms).await?,
                RoomsAction::Show { id } => commands::rooms::show(&rooms, &id).await?,
                RoomsAction::Rename { id, title } => {
                    commands::rooms::rename(&rooms, &id, &title).await?
                }
                RoomsAction::Delete { id } => commands::rooms::delete(&rooms, &id).await?,
                RoomsAction::Clear { yes } => commands::rooms::clear(&rooms, yes).await?,
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&paths)?,
            ConfigAction::Init { force } => commands::config::init(&paths, force)?,
        },
    }

    Ok(())
}
