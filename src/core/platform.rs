//! Host platform detection.

use std::fmt;
use std::path::Path;

/// Mount point of the Linux container on ChromeOS. Files there cannot be
/// executed, so anything that must be built and run is relocated first.
pub const RESTRICTED_MOUNT: &str = "/mnt/chromeos";

/// Platform `xb` is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    MacOs,
    Windows,
}

impl HostPlatform {
    /// Detect the host platform. Unix flavors other than macOS are treated
    /// as Linux.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }

    /// Value of the generator's `--os` flag.
    pub fn generator_os(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::MacOs => "macosx",
            HostPlatform::Windows => "windows",
        }
    }

    /// Target of the generator's bootstrap makefile.
    pub fn bootstrap_target(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::MacOs => "osx",
            HostPlatform::Windows => "windows",
        }
    }

    /// Executable file name for `stem` on this platform.
    pub fn exe_name(&self, stem: &str) -> String {
        match self {
            HostPlatform::Windows => format!("{}.exe", stem),
            _ => stem.to_string(),
        }
    }

    pub fn is_windows(&self) -> bool {
        *self == HostPlatform::Windows
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::Linux => write!(f, "linux"),
            HostPlatform::MacOs => write!(f, "macos"),
            HostPlatform::Windows => write!(f, "windows"),
        }
    }
}

/// Whether `path` lives on a filesystem that forbids executables.
pub fn is_restricted_filesystem(path: &Path) -> bool {
    path.starts_with(RESTRICTED_MOUNT)
}
