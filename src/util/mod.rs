//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod shell;

pub use config::Config;
pub use context::GlobalContext;
pub use process::{EnvOverlay, FailurePolicy, ProcessBuilder, ProcessRunner, SystemRunner};
pub use shell::{Shell, Status};
