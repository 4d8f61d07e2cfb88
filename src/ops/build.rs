//! `xb build`: generate driver projects and build one configuration.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::core::profile::Profile;
use crate::ops::generate::generate;
use crate::ops::parse_args;
use crate::toolchain::driver::find_driver;
use crate::toolchain::error::ToolchainError;
use crate::util::context::GlobalContext;
use crate::util::process::{FailurePolicy, ProcessBuilder};
use crate::util::shell::Status;

#[derive(Parser, Debug)]
#[command(about = "Builds the project")]
struct BuildArgs {
    /// Build the Debug configuration instead of Release
    #[arg(long)]
    debug: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Targets to build (default: everything)
    targets: Vec<String>,
}

/// Options for [`build`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub profile: Profile,
    pub jobs: Option<usize>,
    pub targets: Vec<String>,
}

/// Build a configuration. The driver's exit status is returned unchanged.
pub fn build(ctx: &GlobalContext, opts: &BuildOptions) -> Result<i32> {
    let driver_name = ctx.workspace().config().driver.name.clone();
    let Some(driver) = find_driver(ctx) else {
        return Err(ToolchainError::DriverMissing { name: driver_name }.into());
    };
    generate(ctx, std::slice::from_ref(&driver_name))?;

    let profile_dir = ctx.workspace().profile_dir(opts.profile);

    ctx.shell().status(
        Status::Building,
        format!("{} ({})", ctx.workspace().project_name(), opts.profile),
    );

    let mut cmd = ProcessBuilder::new(driver).arg("-C").arg(&profile_dir);
    if let Some(jobs) = opts.jobs {
        cmd = cmd.arg("-j").arg(jobs.to_string());
    }
    let cmd = cmd
        .args(&opts.targets)
        .cwd(ctx.workspace().root())
        .overlay(&ctx.toolchain_overlay()?)
        .policy(FailurePolicy::ReturnCode);

    let status = ctx.runner().run(&cmd)?;
    if status == 0 {
        ctx.shell()
            .status(Status::Finished, format!("{} build", opts.profile));
    } else {
        ctx.shell()
            .error(format!("{} exited with status {}", driver_name, status));
    }
    Ok(status)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let args: BuildArgs = match parse_args("build", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    build(
        ctx,
        &BuildOptions {
            profile: Profile::from_debug_flag(args.debug),
            jobs: args.jobs,
            targets: args.targets,
        },
    )
}
