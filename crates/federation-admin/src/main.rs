mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::{Commands, Context};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "federation-admin")]
#[command(version)]
#[command(about = "Inspect and maintain the federated transaction log", long_about = None)]
struct Cli {
    /// Transaction log to operate on (default: the config's log path, or
    /// ./federation-transactions.log)
    #[arg(long = "log", global = true)]
    log: Option<PathBuf>,

    /// Coordinator config file to take the log path from
    #[arg(long = "config", short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let context = Context::new(cli.log, cli.config);
    if let Err(e) = cli.command.execute(&context) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
