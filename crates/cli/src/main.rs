mod cmd;
mod load;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

/// cfgdeploy - dependency-ordered configuration deployment
#[derive(Parser)]
#[command(name = "cfgdeploy")]
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
  /// Show the deployment order of each environment
  Plan {
    /// Path to the plan document
    file: PathBuf,

    /// Only show this environment
    #[arg(short, long)]
    environment: Option<String>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Write each environment's dependency graph as a DOT file
  Graph {
    /// Path to the plan document
    file: PathBuf,

    /// Directory the `<environment>.dot` files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
  },

  /// Resolve and render every configuration without calling any remote API
  Validate {
    /// Path to the plan document
    file: PathBuf,

    /// Write one JSON record per configuration to this file
    #[arg(long)]
    report: Option<PathBuf>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(code) => code,
    Err(e) => {
      output::print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<ExitCode> {
  match cli.command {
    Commands::Plan {
      file,
      environment,
      output,
    } => cmd::cmd_plan(&file, environment.as_deref(), output),
    Commands::Graph { file, out_dir } => cmd::cmd_graph(&file, &out_dir),
    Commands::Validate { file, report } => cmd::cmd_validate(&file, report.as_deref()),
  }
}
