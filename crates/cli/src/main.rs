mod cmd;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitepack_lib::config::BuildMode;

use crate::output::{OutputFormat, print_error};

/// sitepack - asset bundler for static sites
#[derive(Parser)]
#[command(name = "sitepack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build unminified assets and update documents
  Dev {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Build stripped assets, update documents and prune old artifacts
  Prod {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Remove superseded artifacts beyond the retention count
  Prune {
    /// Show what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the current build manifest
  Status {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Dev { output } => cmd::cmd_build(BuildMode::Development, cli.verbose, output),
    Commands::Prod { output } => cmd::cmd_build(BuildMode::Production, cli.verbose, output),
    Commands::Prune { dry_run, output } => cmd::cmd_prune(dry_run, output),
    Commands::Status { output } => cmd::cmd_status(cli.verbose, output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
