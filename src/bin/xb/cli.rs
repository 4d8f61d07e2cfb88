//! CLI definitions using clap.

use clap::{Parser, Subcommand};

use xb::util::shell::ColorChoice;

/// xb - build orchestration for a large native project
///
/// Commands: setup, pull, generate-projects (gyp), build, test, clean, nuke,
/// trace-dump. Run `xb` without arguments for the full list and
/// `xb <command> --help` for details.
#[derive(Parser, Debug)]
#[command(name = "xb")]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Option<Dispatch>,
}

/// Everything after the global flags is handed to the command registry.
#[derive(Subcommand, Debug)]
pub enum Dispatch {
    #[command(external_subcommand)]
    External(Vec<String>),
}

impl Cli {
    /// Command name followed by its arguments; empty when none was given.
    pub fn argv(self) -> Vec<String> {
        match self.command {
            Some(Dispatch::External(argv)) => argv,
            None => Vec::new(),
        }
    }
}
