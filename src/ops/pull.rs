//! `xb pull`: update the checkout and its dependencies.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::ops::generate::generate_all;
use crate::ops::parse_args;
use crate::ops::setup::{git, update_submodules};
use crate::util::context::GlobalContext;
use crate::util::shell::Status;

#[derive(Parser, Debug)]
#[command(about = "Pulls the repo and all dependencies")]
struct PullArgs {
    /// Merge upstream changes instead of rebasing onto them
    #[arg(long)]
    merge: bool,
}

/// Options for [`pull`].
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub merge: bool,
}

pub fn pull(ctx: &GlobalContext, opts: &PullOptions) -> Result<()> {
    ctx.shell().status(Status::Fetching, "upstream changes");
    if opts.merge {
        git(ctx, &["pull"])?;
    } else {
        git(ctx, &["pull", "--rebase"])?;
    }

    update_submodules(ctx)?;
    generate_all(ctx)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let args: PullArgs = match parse_args("pull", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    pull(ctx, &PullOptions { merge: args.merge })?;
    ctx.shell().status(Status::Finished, "pull");
    Ok(0)
}
