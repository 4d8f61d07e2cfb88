//! Command dispatch.

use std::io::Write;

use anyhow::Result;

use crate::core::registry::Registry;
use crate::util::GlobalContext;

/// Program name shown in usage text.
pub const PROGRAM_NAME: &str = "xb";

/// Exit status for a missing or unknown command.
pub const USAGE_ERROR: i32 = 1;

/// Resolve `argv[0]` to a command and run it with the remaining arguments.
///
/// A missing or unknown command name writes usage to `out` and yields
/// [`USAGE_ERROR`]. `--help` or `-h` directly after the command name prints
/// the command's long help. Errors from the handler propagate unchanged.
pub fn dispatch(
    registry: &Registry,
    ctx: &GlobalContext,
    argv: &[String],
    out: &mut dyn Write,
) -> Result<i32> {
    let Some((name, args)) = argv.split_first() else {
        write!(out, "{}", registry.usage(PROGRAM_NAME))?;
        return Ok(USAGE_ERROR);
    };

    let Some(command) = registry.get(name) else {
        writeln!(out, "unknown command `{}`\n", name)?;
        write!(out, "{}", registry.usage(PROGRAM_NAME))?;
        return Ok(USAGE_ERROR);
    };

    if matches!(args.first().map(String::as_str), Some("--help" | "-h")) {
        writeln!(out, "{} {}\n\n{}", PROGRAM_NAME, command.name(), command.help_long())?;
        return Ok(0);
    }

    tracing::debug!("dispatching `{}` with {:?}", name, args);
    let status = command.execute(ctx, args, ctx.cwd())?;
    tracing::debug!("`{}` finished with status {}", name, status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use tempfile::TempDir;

    use crate::core::registry::Command;
    use crate::test_support::{test_context, RecordingRunner};

    type Calls = Rc<RefCell<Vec<(String, Vec<String>, PathBuf)>>>;

    fn recording_registry(names: &[&str]) -> (Registry, Calls) {
        let calls: Calls = Rc::default();
        let mut registry = Registry::new();
        for name in names {
            let calls = Rc::clone(&calls);
            let recorded_name = name.to_string();
            registry
                .register(Command::new(*name, format!("Runs {}.", name), move |_, args, cwd| {
                    calls
                        .borrow_mut()
                        .push((recorded_name.clone(), args.to_vec(), cwd.to_path_buf()));
                    Ok(0)
                }))
                .unwrap();
        }
        (registry, calls)
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_command_prints_sorted_usage() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let (registry, calls) = recording_registry(&["setup", "build", "nuke", "clean"]);

        for bad in [argv(&[]), argv(&["bogus"]), argv(&["Build"])] {
            let mut out = Vec::new();
            let status = dispatch(&registry, &ctx, &bad, &mut out).unwrap();
            assert_eq!(status, USAGE_ERROR);

            let text = String::from_utf8(out).unwrap();
            let positions: Vec<_> = ["build", "clean", "nuke", "setup"]
                .iter()
                .map(|name| text.find(&format!("  {}\n", name)).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_each_command_runs_once_with_empty_args() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let names = ["build", "clean", "nuke", "pull", "setup", "test"];
        let (registry, calls) = recording_registry(&names);

        for name in names {
            calls.borrow_mut().clear();
            let mut out = Vec::new();
            let status = dispatch(&registry, &ctx, &argv(&[name]), &mut out).unwrap();

            assert_eq!(status, 0);
            let calls = calls.borrow();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0, name);
            assert!(calls[0].1.is_empty());
            assert_eq!(calls[0].2, tmp.path());
        }
    }

    #[test]
    fn test_remaining_args_are_forwarded() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let (registry, calls) = recording_registry(&["build"]);

        dispatch(&registry, &ctx, &argv(&["build", "--debug", "core"]), &mut Vec::new())
            .unwrap();

        assert_eq!(calls.borrow()[0].1, argv(&["--debug", "core"]));
    }

    #[test]
    fn test_handler_status_is_returned() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let mut registry = Registry::new();
        registry
            .register(Command::new("build", "Builds.", |_, _, _| Ok(42)))
            .unwrap();

        let status = dispatch(&registry, &ctx, &argv(&["build"]), &mut Vec::new()).unwrap();
        assert_eq!(status, 42);
    }

    #[test]
    fn test_handler_errors_propagate() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let mut registry = Registry::new();
        registry
            .register(Command::new("pull", "Pulls.", |_, _, _| {
                anyhow::bail!("git exploded")
            }))
            .unwrap();

        let err = dispatch(&registry, &ctx, &argv(&["pull"]), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("git exploded"));
    }

    #[test]
    fn test_help_flag_prints_long_help() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());
        let (mut registry, calls) = recording_registry(&["build"]);
        registry
            .register(
                Command::new("nuke", "Removes build/.", |_, _, _| Ok(0))
                    .with_long_help("Removes the entire build output tree."),
            )
            .unwrap();

        let mut out = Vec::new();
        let status = dispatch(&registry, &ctx, &argv(&["nuke", "--help"]), &mut out).unwrap();

        assert_eq!(status, 0);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Removes the entire build output tree."));
        assert!(calls.borrow().is_empty());
    }
}
