mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, init, run, CheckArgs, InitArgs, RunArgs};
use tracing_subscriber::EnvFilter;

/// Formloom CLI - compile and replay declarative forms
#[derive(Parser, Debug)]
#[command(name = "formloom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log engine transitions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sample form and edit script
    Init(InitArgs),

    /// Compile a form and print its tree and initial document
    Check(CheckArgs),

    /// Replay an edit script against a form
    Run(RunArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| {
            let cwd = cwd.display().to_string();
            match cli.command {
                Command::Init(args) => init(args, &cwd),
                Command::Check(args) => check(args, &cwd),
                Command::Run(args) => run(args, &cwd),
            }
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
