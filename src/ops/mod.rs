//! High-level operations.
//!
//! This module contains the implementation of xb commands. Each submodule
//! exposes an `execute(ctx, args, cwd)` entry point used as the command's
//! handler, plus a typed function for callers that already hold options.

pub mod build;
pub mod clean;
pub mod generate;
pub mod nuke;
pub mod pull;
pub mod setup;
pub mod trace_dump;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use crate::core::dispatch::{PROGRAM_NAME, USAGE_ERROR};
use crate::core::registry::{Command, Registry};

pub use build::{build, BuildOptions};
pub use clean::clean;
pub use generate::{generate, generate_all};
pub use nuke::nuke;
pub use pull::{pull, PullOptions};
pub use setup::setup;
pub use test::{test, TestOptions};
pub use trace_dump::{trace_dump, TraceDumpOptions};

/// Build the registry of every built-in command.
pub fn builtin_commands() -> Result<Registry> {
    let mut registry = Registry::new();

    registry.register(
        Command::new(
            "setup",
            "Setup the build environment.",
            setup::execute,
        )
        .with_long_help(
            "Initializes submodules, bootstraps the build driver and the project \
             generator, and generates projects for every backend of this platform.\n\
             Run this once after cloning.",
        ),
    )?;
    registry.register(
        Command::new("pull", "Pulls the repo and all dependencies.", pull::execute)
            .with_long_help(
                "Rebases the current branch on its upstream (or merges with --merge), \
                 updates submodules, and regenerates projects.",
            ),
    )?;
    for name in ["generate-projects", "gyp"] {
        registry.register(
            Command::new(
                name,
                "Runs the project generator on all backends.",
                generate::execute,
            )
            .with_long_help(
                "Regenerates project files for every backend of this platform. \
                 Use --backend to restrict generation to specific backends.",
            ),
        )?;
    }
    registry.register(
        Command::new("build", "Builds the project.", build::execute).with_long_help(
            "Generates the build driver's project files and builds the Release \
             configuration (or Debug with --debug). Extra arguments name targets.",
        ),
    )?;
    registry.register(
        Command::new("test", "Runs automated tests.", test::execute).with_long_help(
            "Regenerates code-generation test fixtures and runs the test binary. \
             Arguments after -- are passed to the test binary.",
        ),
    )?;
    registry.register(
        Command::new("clean", "Removes intermediate files and build output.", clean::execute)
            .with_long_help("Removes the generated project tree. Fetched dependencies are kept."),
    )?;
    registry.register(
        Command::new(
            "nuke",
            "Removes all build/ output.",
            nuke::execute,
        )
        .with_long_help(
            "Removes the entire build output tree. Run setup afterwards to start over.",
        ),
    )?;
    registry.register(
        Command::new(
            "trace-dump",
            "Dumps every trace file in a directory.",
            trace_dump::execute,
        )
        .with_long_help(
            "Runs the trace dump binary once per trace file found under the given \
             directory, in parallel, writing one log per trace.",
        ),
    )?;

    Ok(registry)
}

/// Parse a command's arguments with clap.
///
/// Parse failures are printed by clap. Requests for help or version yield
/// `Err(0)`, any other failure `Err(USAGE_ERROR)`.
pub(crate) fn parse_args<T: Parser>(name: &str, args: &[String]) -> std::result::Result<T, i32> {
    let argv = std::iter::once(format!("{} {}", PROGRAM_NAME, name)).chain(args.iter().cloned());
    T::try_parse_from(argv).map_err(|err| {
        let _ = err.print();
        match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
            _ => USAGE_ERROR,
        }
    })
}
