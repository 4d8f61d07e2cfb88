//! Native compiler environment import.
//!
//! On Windows the compiler, linker and SDK are only usable from a shell that
//! ran Visual Studio's developer environment script. The importer finds the
//! newest installation with `vswhere`, runs that script followed by `set`
//! in a `cmd` sub-shell, and keeps an allow-listed subset of the dumped
//! variables as an [`EnvOverlay`] for later child processes. The current
//! process environment is never modified.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::toolchain::locate::locate;
use crate::util::process::{EnvOverlay, FailurePolicy, ProcessBuilder, ProcessRunner};

/// Synthesized variable carrying the imported installation's major version.
pub const VERSION_MARKER: &str = "VSVERSION";

/// Variables copied out of the developer environment (compared
/// case-insensitively, stored upper-cased).
pub const IMPORTED_VARIABLES: &[&str] = &[
    "devenvdir",
    "include",
    "lib",
    "libpath",
    "path",
    "pathext",
    "systemroot",
    "temp",
    "tmp",
    "windowssdkdir",
    "vsinstalldir",
    "vcinstalldir",
    "visualstudioversion",
];

/// Oldest Visual Studio release with a `vswhere`-discoverable install.
const MIN_VERSION: &str = "[15,)";

/// Separator of `PATH` entries in the imported (Windows) environment.
const WINDOWS_PATH_SEPARATOR: char = ';';

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VswhereEntry {
    installation_path: PathBuf,
    #[serde(default)]
    installation_version: String,
    #[serde(default)]
    catalog: Option<VswhereCatalog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VswhereCatalog {
    product_line_version: Option<String>,
}

/// An installed compiler suite reported by the locator utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Installation root
    pub path: PathBuf,
    /// Major version (`17` for Visual Studio 2022)
    pub version: u32,
    /// Marketing year, when reported
    pub product_line: Option<u32>,
}

/// Developer environment script and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevEnvScript {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Result of a successful import.
#[derive(Debug, Clone)]
pub struct ImportedEnvironment {
    pub installation: Installation,
    pub overlay: EnvOverlay,
}

impl ImportedEnvironment {
    /// Generator backend producing IDE projects for this installation.
    pub fn ide_backend(&self) -> Option<String> {
        self.installation
            .product_line
            .map(|year| format!("vs{}", year))
    }
}

/// Parse the JSON array printed by `vswhere -format json`.
///
/// Entries whose version cannot be read are skipped.
pub fn parse_installations(json: &str) -> Result<Vec<Installation>> {
    let entries: Vec<VswhereEntry> =
        serde_json::from_str(json).context("failed to parse vswhere output")?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let major = entry.installation_version.split('.').next()?;
            let Ok(version) = major.parse::<u32>() else {
                tracing::warn!(
                    "ignoring installation at {} with unreadable version `{}`",
                    entry.installation_path.display(),
                    entry.installation_version
                );
                return None;
            };
            let product_line = entry
                .catalog
                .and_then(|catalog| catalog.product_line_version)
                .and_then(|year| year.parse().ok());
            Some(Installation {
                path: entry.installation_path,
                version,
                product_line,
            })
        })
        .collect())
}

/// Pick the developer environment script of an installation: the unified
/// `VsDevCmd.bat` when present, `vcvarsall.bat` otherwise.
pub fn find_dev_env_script(installation: &Installation) -> Option<DevEnvScript> {
    let vsdevcmd = installation
        .path
        .join("Common7")
        .join("Tools")
        .join("VsDevCmd.bat");
    if vsdevcmd.is_file() {
        return Some(DevEnvScript {
            path: vsdevcmd,
            args: vec!["-arch=amd64".to_string(), "-host_arch=amd64".to_string()],
        });
    }

    let vcvarsall = installation
        .path
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");
    if vcvarsall.is_file() {
        return Some(DevEnvScript {
            path: vcvarsall,
            args: vec!["x64".to_string()],
        });
    }

    None
}

/// Keep the allow-listed variables of a `set` dump.
///
/// Keys are upper-cased. `PATH` is prefixed with `front_of_path` so our own
/// tools win over anything the script put there.
pub fn parse_environment_dump(dump: &str, front_of_path: Option<&Path>) -> EnvOverlay {
    dump.lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(name, _)| {
            IMPORTED_VARIABLES
                .iter()
                .any(|allowed| name.eq_ignore_ascii_case(allowed))
        })
        .map(|(name, value)| {
            let name = name.to_ascii_uppercase();
            let value = match (name.as_str(), front_of_path) {
                ("PATH", Some(dir)) => {
                    format!("{}{}{}", dir.display(), WINDOWS_PATH_SEPARATOR, value)
                }
                _ => value.to_string(),
            };
            (name, value)
        })
        .collect()
}

/// Import the environment of the first installation listed in `vswhere`'s
/// JSON output.
pub fn import_from_locator_output(
    json: &str,
    runner: &dyn ProcessRunner,
) -> Result<Option<ImportedEnvironment>> {
    let Some(installation) = parse_installations(json)?.into_iter().next() else {
        tracing::debug!("vswhere reported no installations");
        return Ok(None);
    };

    let Some(script) = find_dev_env_script(&installation) else {
        tracing::warn!(
            "no developer environment script under {}",
            installation.path.display()
        );
        return Ok(None);
    };

    // The script runs from a temporary batch file to sidestep cmd.exe's
    // quoting rules for paths with spaces.
    let mut batch = tempfile::Builder::new()
        .prefix("xb_devenv")
        .suffix(".bat")
        .tempfile()
        .context("failed to create temporary batch file")?;
    write!(
        batch,
        "@echo off\r\ncall \"{}\" {} >nul 2>&1\r\nif errorlevel 1 exit /b 1\r\nset\r\n",
        script.path.display(),
        script.args.join(" ")
    )
    .context("failed to write temporary batch file")?;
    batch.flush()?;

    let captured = runner.capture(
        &ProcessBuilder::new("cmd")
            .arg("/c")
            .arg(batch.path())
            .policy(FailurePolicy::ReturnCode),
    )?;
    if captured.status != 0 {
        tracing::warn!(
            "{} exited with status {}",
            script.path.display(),
            captured.status
        );
        return Ok(None);
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let overlay = parse_environment_dump(&captured.stdout, exe_dir.as_deref())
        .with(VERSION_MARKER, installation.version.to_string());

    Ok(Some(ImportedEnvironment {
        installation,
        overlay,
    }))
}

/// Find `vswhere.exe`: checked-in copy, then `PATH`, then the installer's
/// standard location.
fn find_vswhere(root: &Path) -> Option<PathBuf> {
    let checked_in = root.join("tools").join("vswhere").join("vswhere.exe");
    if checked_in.is_file() {
        return Some(checked_in);
    }

    if let Some(path) = locate("vswhere", &EnvOverlay::new()) {
        return Some(path);
    }

    let program_files_x86 = std::env::var("ProgramFiles(x86)")
        .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());
    let standard_path = PathBuf::from(program_files_x86)
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");
    standard_path.is_file().then_some(standard_path)
}

/// Import the newest installed Visual Studio environment.
///
/// Always `None` off Windows, and `None` when no installation can be found;
/// the caller decides whether that is fatal.
pub fn import_native_toolchain_environment(
    runner: &dyn ProcessRunner,
    root: &Path,
) -> Result<Option<ImportedEnvironment>> {
    if !cfg!(windows) {
        return Ok(None);
    }

    let Some(vswhere) = find_vswhere(root) else {
        tracing::debug!("vswhere.exe not found, cannot import the MSVC environment");
        return Ok(None);
    };

    let output = runner.capture(
        &ProcessBuilder::new(&vswhere)
            .args([
                "-version",
                MIN_VERSION,
                "-latest",
                "-prerelease",
                "-format",
                "json",
                "-utf8",
            ])
            .policy(FailurePolicy::ReturnCode),
    )?;
    if output.status != 0 {
        tracing::warn!("vswhere failed with status {}: {}", output.status, output.stderr);
        return Ok(None);
    }

    import_from_locator_output(&output.stdout, runner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::test_support::{MockProcessOutput, RecordingRunner};

    const DUMP: &str = "ALLUSERSPROFILE=C:\\ProgramData\r\n\
        INCLUDE=C:\\VS\\include\r\n\
        Path=C:\\VS\\bin;C:\\Windows\r\n\
        lib=C:\\VS\\lib\r\n\
        WindowsSdkDir=C:\\Kits\\10\\\r\n\
        PROMPT=$P$G\r\n\
        not a variable line\r\n";

    fn vs_install(root: &Path, script: &str) -> PathBuf {
        let install = root.join("VS 2022");
        let script_path = install.join(script);
        std::fs::create_dir_all(script_path.parent().unwrap()).unwrap();
        std::fs::write(&script_path, "@echo off").unwrap();
        install
    }

    fn vswhere_json(install: &Path, version: &str) -> String {
        serde_json::json!([{
            "installationPath": install,
            "installationVersion": version,
            "catalog": { "productLineVersion": "2022" },
        }])
        .to_string()
    }

    #[test]
    fn test_import_yields_version_marker() {
        let tmp = TempDir::new().unwrap();
        let install = vs_install(tmp.path(), "Common7/Tools/VsDevCmd.bat");
        let runner = RecordingRunner::new()
            .respond_with(|_| MockProcessOutput::success(DUMP));

        let env = import_from_locator_output(&vswhere_json(&install, "17"), &runner)
            .unwrap()
            .unwrap();

        assert_eq!(env.installation.version, 17);
        assert_eq!(env.overlay.get(VERSION_MARKER), Some("17"));
        assert_eq!(env.overlay.get("INCLUDE"), Some("C:\\VS\\include"));
        assert_eq!(env.overlay.get("LIB"), Some("C:\\VS\\lib"));
        assert_eq!(env.ide_backend().as_deref(), Some("vs2022"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get_program(), Path::new("cmd"));
    }

    #[test]
    fn test_full_version_string_uses_major_component() {
        let installs = parse_installations(
            r#"[{"installationPath": "C:\\VS", "installationVersion": "16.11.34729.46"},
                {"installationPath": "C:\\Broken", "installationVersion": "preview"}]"#,
        )
        .unwrap();

        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].version, 16);
        assert_eq!(installs[0].product_line, None);
    }

    #[test]
    fn test_empty_locator_output_is_absent() {
        let runner = RecordingRunner::new();
        assert!(import_from_locator_output("[]", &runner).unwrap().is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_malformed_locator_output_is_an_error() {
        let runner = RecordingRunner::new();
        assert!(import_from_locator_output("not json", &runner).is_err());
    }

    #[test]
    fn test_failing_script_is_absent() {
        let tmp = TempDir::new().unwrap();
        let install = vs_install(tmp.path(), "Common7/Tools/VsDevCmd.bat");
        let runner = RecordingRunner::new().respond_with(|_| MockProcessOutput::failure(1, ""));

        let env = import_from_locator_output(&vswhere_json(&install, "17.9"), &runner).unwrap();
        assert!(env.is_none());
    }

    #[test]
    fn test_script_preference() {
        let tmp = TempDir::new().unwrap();
        let install = vs_install(tmp.path(), "VC/Auxiliary/Build/vcvarsall.bat");
        let installation = Installation {
            path: install.clone(),
            version: 15,
            product_line: Some(2017),
        };

        let script = find_dev_env_script(&installation).unwrap();
        assert!(script.path.ends_with("vcvarsall.bat"));
        assert_eq!(script.args, ["x64"]);

        vs_install(tmp.path(), "Common7/Tools/VsDevCmd.bat");
        let script = find_dev_env_script(&installation).unwrap();
        assert!(script.path.ends_with("VsDevCmd.bat"));
        assert_eq!(script.args, ["-arch=amd64", "-host_arch=amd64"]);
    }

    #[test]
    fn test_dump_filtering() {
        let overlay = parse_environment_dump(DUMP, Some(Path::new("C:\\xb")));

        assert_eq!(overlay.get("PATH"), Some("C:\\xb;C:\\VS\\bin;C:\\Windows"));
        assert_eq!(overlay.get("WINDOWSSDKDIR"), Some("C:\\Kits\\10\\"));
        assert!(overlay.get("PROMPT").is_none());
        assert!(overlay.get("ALLUSERSPROFILE").is_none());
        assert!(overlay.get("Path").is_none());
        assert_eq!(overlay.len(), 4);
    }

    #[test]
    fn test_not_imported_off_windows() {
        if cfg!(windows) {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let runner = RecordingRunner::new();

        assert!(import_native_toolchain_environment(&runner, tmp.path())
            .unwrap()
            .is_none());
        assert!(runner.calls().is_empty());
    }
}
