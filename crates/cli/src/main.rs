//! `lk`: start, supervise and build the processes of a desktop application.

mod cli;
mod commands;
mod prompt;
mod report;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use lk_core::telemetry;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = color_eyre::install() {
        eprintln!("{} {error}", "warning:".yellow());
    }
    if let Err(error) = telemetry::initialise(&cli.log, cli.log_format) {
        eprintln!("{} {error}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Up(args) => commands::up::run(&cli.project, args).await,
        Commands::Build(args) => commands::build::run(&cli.project, args).await,
        Commands::Check(args) => commands::check::run(&cli.project, args).await,
    };

    match result {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{} {report:?}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
