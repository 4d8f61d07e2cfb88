//! `xb trace-dump`: dump every trace file under a directory in parallel.
//!
//! The dump binary is health-probed first by running it without a trace
//! file. It answers that with exit code 5, so 5 is the only status treated
//! as healthy. This is a brittle contract with the external binary: any
//! change to its argument handling breaks the probe.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;

use crate::core::profile::Profile;
use crate::ops::parse_args;
use crate::toolchain::error::ToolchainError;
use crate::util::context::GlobalContext;
use crate::util::fs::{ensure_dir, files_with_extension, relative_path};
use crate::util::process::{FailurePolicy, ProcessBuilder, ProcessRunner};
use crate::util::shell::Status;

/// Exit code of the dump binary when no trace file is given.
pub const PROBE_EXIT_CODE: i32 = 5;

#[derive(Parser, Debug)]
#[command(about = "Dumps every trace file in a directory")]
struct TraceDumpArgs {
    /// Directory searched recursively for trace files
    trace_dir: PathBuf,

    /// Directory receiving dumps and logs
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Number of dumps run in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Use the Debug build of the dump binary
    #[arg(long)]
    debug: bool,

    /// Dump binary to use instead of the built one
    #[arg(long)]
    binary: Option<PathBuf>,
}

/// Options for [`trace_dump`].
#[derive(Debug, Clone)]
pub struct TraceDumpOptions {
    pub trace_dir: PathBuf,
    pub out_dir: PathBuf,
    pub binary: PathBuf,
    pub jobs: usize,
}

/// Outcome of dumping one trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResult {
    pub trace: PathBuf,
    pub status: i32,
}

/// Run the binary without a trace file and check for [`PROBE_EXIT_CODE`].
pub fn probe(runner: &dyn ProcessRunner, binary: &Path) -> Result<()> {
    if !binary.is_file() {
        return Err(ToolchainError::BinaryMissing {
            path: binary.to_path_buf(),
        }
        .into());
    }

    let captured = runner.capture(&ProcessBuilder::new(binary).policy(FailurePolicy::ReturnCode))?;
    if captured.status != PROBE_EXIT_CODE {
        return Err(ToolchainError::UnhealthyBinary {
            path: binary.to_path_buf(),
            code: captured.status,
            expected: PROBE_EXIT_CODE,
        }
        .into());
    }
    Ok(())
}

/// Log file for `trace` with the given suffix, mirroring the trace's
/// position under `trace_dir`.
///
/// The full file name is kept so traces differing only in extension case
/// never share a log.
fn log_path(opts: &TraceDumpOptions, trace: &Path, suffix: &str) -> PathBuf {
    let relative = relative_path(&opts.trace_dir, trace);
    let mut name = relative.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    let dir = relative.parent().map(Path::to_path_buf).unwrap_or_default();
    opts.out_dir.join(dir).join(name)
}

fn dump_one(runner: &dyn ProcessRunner, opts: &TraceDumpOptions, trace: &Path) -> Result<i32> {
    let stdout = log_path(opts, trace, ".stdout.log");
    let dump_dir = stdout
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| opts.out_dir.clone());
    runner.run(
        &ProcessBuilder::new(&opts.binary)
            .arg(format!("--target_trace_file={}", trace.display()))
            .arg(format!("--trace_dump_path={}", dump_dir.display()))
            .stdout_to(stdout)
            .stderr_to(log_path(opts, trace, ".stderr.log"))
            .policy(FailurePolicy::ReturnCode),
    )
}

/// Dump every trace found under `opts.trace_dir`.
///
/// Returns 0 when all dumps succeed, otherwise the first failing status in
/// trace order.
pub fn trace_dump(ctx: &GlobalContext, opts: &TraceDumpOptions) -> Result<i32> {
    if !opts.trace_dir.is_dir() {
        bail!("trace directory {} does not exist", opts.trace_dir.display());
    }

    let extension = &ctx.workspace().config().trace.extension;
    let traces = files_with_extension(&opts.trace_dir, extension)?;
    if traces.is_empty() {
        ctx.shell().warn(format!(
            "no .{} files under {}",
            extension,
            opts.trace_dir.display()
        ));
        return Ok(0);
    }

    let runner = ctx.runner();
    probe(runner, &opts.binary)?;
    ensure_dir(&opts.out_dir)?;

    ctx.shell().status(
        Status::Dumping,
        format!("{} traces with {} jobs", traces.len(), opts.jobs),
    );
    let progress = ctx.shell().progress(traces.len() as u64, "dumping");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .context("failed to start dump workers")?;
    let results: Vec<Result<DumpResult>> = pool.install(|| {
        traces
            .par_iter()
            .map(|trace| {
                let status = dump_one(runner, opts, trace)?;
                progress.tick(relative_path(&opts.trace_dir, trace).display());
                Ok(DumpResult {
                    trace: trace.clone(),
                    status,
                })
            })
            .collect()
    });
    progress.finish();

    let results = results.into_iter().collect::<Result<Vec<_>>>()?;
    let failed: Vec<&DumpResult> = results.iter().filter(|r| r.status != 0).collect();
    for result in &failed {
        ctx.shell().error(format!(
            "{} exited with status {}",
            result.trace.display(),
            result.status
        ));
    }

    match failed.first() {
        Some(first) => Ok(first.status),
        None => {
            ctx.shell()
                .status(Status::Finished, format!("{} traces", results.len()));
            Ok(0)
        }
    }
}

pub fn execute(ctx: &GlobalContext, args: &[String], cwd: &Path) -> Result<i32> {
    let args: TraceDumpArgs = match parse_args("trace-dump", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    let workspace = ctx.workspace();
    let profile = Profile::from_debug_flag(args.debug);
    let jobs = args
        .jobs
        .or(workspace.config().trace.jobs)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1);

    let opts = TraceDumpOptions {
        trace_dir: cwd.join(args.trace_dir),
        out_dir: args
            .out
            .map(|out| cwd.join(out))
            .unwrap_or_else(|| workspace.trace_dump_dir()),
        binary: args
            .binary
            .map(|binary| cwd.join(binary))
            .unwrap_or_else(|| workspace.trace_dump_binary(profile, ctx.host())),
        jobs,
    };
    trace_dump(ctx, &opts)
}
