//! `xb generate-projects` (alias `gyp`): run the project generator.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use crate::core::platform::HostPlatform;
use crate::ops::parse_args;
use crate::toolchain::bootstrap::ensure_generator;
use crate::util::context::GlobalContext;
use crate::util::fs::relative_path;
use crate::util::process::ProcessBuilder;
use crate::util::shell::Status;

/// Backend producing Xcode projects.
const XCODE_BACKEND: &str = "xcode4";

#[derive(Parser, Debug)]
#[command(about = "Runs the project generator on all backends")]
struct GenerateArgs {
    /// Only generate these backends
    #[arg(long = "backend", value_name = "NAME")]
    backends: Vec<String>,
}

/// Backends generated on this host: the build driver's everywhere, Xcode
/// on macOS and the matching Visual Studio version on Windows when a
/// compiler environment is available.
pub fn backends(ctx: &GlobalContext) -> Result<Vec<String>> {
    let mut backends = vec![ctx.workspace().config().driver.name.clone()];

    match ctx.host() {
        HostPlatform::MacOs => backends.push(XCODE_BACKEND.to_string()),
        HostPlatform::Windows => {
            match ctx.native_environment()?.and_then(|env| env.ide_backend()) {
                Some(backend) => backends.push(backend),
                None => tracing::debug!("no Visual Studio backend without a compiler environment"),
            }
        }
        HostPlatform::Linux => {}
    }

    Ok(backends)
}

/// Run `generator` for one backend.
pub fn run_generator(ctx: &GlobalContext, generator: &Path, backend: &str) -> Result<()> {
    let root = ctx.workspace().root();
    let project_file = relative_path(root, &ctx.workspace().project_file());

    ctx.shell()
        .status(Status::Generating, format!("{} projects", backend));
    let overlay = ctx.toolchain_overlay()?;
    ctx.runner()
        .run(
            &ProcessBuilder::new(generator)
                .arg(format!("--file={}", project_file.display()))
                .arg(format!("--os={}", ctx.host().generator_os()))
                .arg("--verbose")
                .arg(backend)
                .cwd(root)
                .overlay(&overlay),
        )
        .with_context(|| format!("failed to generate {} projects", backend))?;
    Ok(())
}

/// Generate projects for `backends`, bootstrapping the generator first.
pub fn generate(ctx: &GlobalContext, backends: &[String]) -> Result<()> {
    let generator = ensure_generator(ctx)?;
    for backend in backends {
        run_generator(ctx, &generator, backend)?;
    }
    Ok(())
}

/// Generate projects for every backend of this host.
pub fn generate_all(ctx: &GlobalContext) -> Result<()> {
    let backends = backends(ctx)?;
    generate(ctx, &backends)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let args: GenerateArgs = match parse_args("generate-projects", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    if args.backends.is_empty() {
        generate_all(ctx)?;
    } else {
        generate(ctx, &args.backends)?;
    }

    ctx.shell().status(Status::Finished, "project generation");
    Ok(0)
}
