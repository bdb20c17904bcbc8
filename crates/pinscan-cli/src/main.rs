use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() -> ExitCode {
    match cli::Cli::command().print_help() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::InvalidSubcommand => return print_usage(),
        Err(e) => e.exit(),
    };
    let Some(command) = cli.command else {
        return print_usage();
    };
    init_tracing(cli.verbose);

    let Some(repo) = cli.repo_path() else {
        eprintln!(
            "{} no repository: pass --repo or set ${}",
            "error:".red().bold(),
            cli::REPO_ENV
        );
        return ExitCode::FAILURE;
    };

    match commands::run_command(&cli, command, &repo).await {
        Ok(commands::Outcome::Finished(summary)) => {
            commands::print_summary(command, &summary);
            ExitCode::SUCCESS
        }
        Ok(commands::Outcome::ForceQuit) => {
            eprintln!("{} scan abandoned", "error:".red().bold());
            // The blocking scan thread cannot be joined, so skip runtime shutdown.
            std::process::exit(130)
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
