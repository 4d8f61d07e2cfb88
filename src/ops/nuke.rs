//! `xb nuke`: remove the whole build output tree.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::ops::parse_args;
use crate::util::context::GlobalContext;
use crate::util::fs::{relative_path, remove_dir_all_if_exists};
use crate::util::shell::Status;

#[derive(Parser, Debug)]
#[command(about = "Removes all build/ output")]
struct NukeArgs {}

/// Remove the build output tree. Returns whether anything was removed.
pub fn nuke(ctx: &GlobalContext) -> Result<bool> {
    let build_dir = ctx.workspace().build_dir();
    let removed = remove_dir_all_if_exists(&build_dir)?;

    let shown = relative_path(ctx.cwd(), &build_dir);
    if removed {
        ctx.shell().status(Status::Removed, shown.display());
        ctx.shell().note("run `xb setup` to prepare the checkout again");
    } else {
        ctx.shell()
            .status(Status::Skipped, format!("{} (not present)", shown.display()));
    }
    Ok(removed)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let _args: NukeArgs = match parse_args("nuke", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    nuke(ctx)?;
    Ok(0)
}
