//! xb CLI - build orchestration front-end

use std::io;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xb::core::dispatch::USAGE_ERROR;
use xb::util::diagnostic::render;
use xb::util::{GlobalContext, Shell};

mod cli;

use cli::Cli;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "XB_LOG";

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", render(&e));
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return Ok(match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => USAGE_ERROR,
            });
        }
    };

    // Set up logging
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("xb=debug")
        } else {
            EnvFilter::new("xb=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);
    let ctx = GlobalContext::new(shell)?;
    let registry = xb::builtin_commands()?;

    // Dispatch
    xb::dispatch(&registry, &ctx, &cli.argv(), &mut io::stdout())
}
