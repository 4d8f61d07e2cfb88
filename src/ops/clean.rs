//! `xb clean`: remove the generated project tree.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::ops::parse_args;
use crate::util::context::GlobalContext;
use crate::util::fs::{relative_path, remove_dir_all_if_exists};
use crate::util::shell::Status;

#[derive(Parser, Debug)]
#[command(about = "Removes intermediate files and build output")]
struct CleanArgs {}

/// Remove the generated project tree. Returns whether anything was removed.
pub fn clean(ctx: &GlobalContext) -> Result<bool> {
    let generated = ctx.workspace().generated_dir();
    let removed = remove_dir_all_if_exists(&generated)?;

    let shown = relative_path(ctx.cwd(), &generated);
    if removed {
        ctx.shell().status(Status::Removed, shown.display());
    } else {
        ctx.shell()
            .status(Status::Skipped, format!("{} (not present)", shown.display()));
    }
    Ok(removed)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let _args: CleanArgs = match parse_args("clean", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    clean(ctx)?;
    Ok(0)
}
