//! Grove CLI - Command line interface for Grove
//!
//! Autonomous triage of long-lived feature branches: merge what is ready,
//! delete what is done, fold together what overlaps.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ConfigArgs, TriageArgs};

/// Grove: autonomous branch lifecycle management
#[derive(Parser, Debug)]
#[command(name = "grove")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Evaluate candidate branches and merge, delete or consolidate them
    #[command(visible_alias = "t")]
    Triage(TriageArgs),

    /// Show current configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("grove {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Triage(args)) => {
            args.execute(cli.verbose).await?;
        }
        Some(Commands::Config(args)) => {
            args.execute()?;
        }
        None => {
            println!("Grove - Autonomous branch lifecycle management");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
