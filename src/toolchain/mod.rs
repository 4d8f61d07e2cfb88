//! External toolchain prerequisites.
//!
//! - Executable lookup on the search path
//! - Native compiler environment import
//! - Build-file generator bootstrap
//! - Build driver discovery

pub mod bootstrap;
pub mod driver;
pub mod env;
pub mod error;
pub mod locate;

pub use bootstrap::{ensure_generator, BootstrapState, GeneratorBootstrapper};
pub use driver::{ensure_driver, find_driver};
pub use env::{import_native_toolchain_environment, ImportedEnvironment};
pub use error::ToolchainError;
pub use locate::locate;
