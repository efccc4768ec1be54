// SPDX-License-Identifier: MIT OR Apache-2.0

//! udash - user directory dashboard
//!
//! Thin presentation layer over the `udash` library: every command drives the
//! same dashboard actions a UI would.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::Colorize;
use commands::Context;
use tracing_subscriber::EnvFilter;
use udash::FetchError;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "udash=debug,warn",
        _ => "udash=trace,debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "udash", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = Context::from_cli(&cli)?;
    let result = match cli.command {
        Commands::List {
            page,
            search,
            filter,
            per_page,
        } => commands::list::run(&ctx, page, search, filter, per_page).await,
        Commands::Show { id } => commands::show::run(&ctx, id).await,
        Commands::Search {
            query,
            filter,
            simple,
            limit,
        } => commands::search::run(&ctx, &query, filter.into(), simple, limit).await,
        Commands::Interactive => commands::interactive::run(&ctx).await,
        Commands::Completions { .. } => Ok(()),
    };
    ctx.finish();
    result
}

fn report(error: &anyhow::Error) {
    match error.downcast_ref::<FetchError>() {
        Some(fetch) => {
            eprintln!("{} {}", "✗".red(), fetch.user_message());
            eprintln!("{} Run the command again to retry.", "ℹ".cyan());
        }
        None => eprintln!("{} {error:#}", "✗".red()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}
