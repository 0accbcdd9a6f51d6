mod cmd_diff;
mod cmd_parse;
mod cmd_vcs;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dbus-deviation")]
#[command(about = "Validate, compare and track D-Bus introspection XML")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse an introspection XML file and report problems with it
    Parse {
        /// Input file (use - for stdin)
        file: PathBuf,

        /// Print the parsed API and diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two introspection XML files for API compatibility
    Diff {
        #[command(flatten)]
        args: cmd_diff::DiffArgs,
    },
    /// Record and check API snapshots stored as git notes on release tags
    Vcs {
        #[command(flatten)]
        git: cmd_vcs::GitArgs,

        #[command(subcommand)]
        op: cmd_vcs::VcsOp,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse { file, json } => cmd_parse::run(file, json, cli.pretty).map(exit_code),
        Commands::Diff { args } => cmd_diff::run(args, cli.pretty).map(exit_code),
        Commands::Vcs { git, op } => cmd_vcs::run(git, op).map(exit_code),
    }
}
