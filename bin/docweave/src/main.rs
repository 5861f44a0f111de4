//! Docweave CLI
//!
//! Builds conceptual articles, API reference pages and REST API documents
//! into JSON output plus a cross-reference map.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Docweave.
#[derive(Parser)]
#[command(
    name = "docweave",
    version,
    about = "A documentation build engine for articles and API reference"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "docweave.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the documentation
    Build {
        /// Output directory (defaults to build.output_dir)
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// Only keep API surface that applies to this moniker
        #[arg(short, long)]
        moniker: Option<String>,
        /// Maximum number of concurrent work items
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Validate configuration, monikers and moniker ranges
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    docweave::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            output,
            moniker,
            jobs,
        } => {
            docweave::cmd::build::run(&cli.config, output.as_deref(), moniker, jobs)?;
        }
        Commands::Check { strict } => {
            docweave::cmd::check::run(&cli.config, strict)?;
        }
    }

    Ok(())
}
