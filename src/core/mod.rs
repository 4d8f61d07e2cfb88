//! Core data structures for xb.
//!
//! - Command registry and dispatch
//! - Workspace layout
//! - Host platform and build profile

pub mod dispatch;
pub mod platform;
pub mod profile;
pub mod registry;
pub mod workspace;

pub use dispatch::dispatch;
pub use platform::HostPlatform;
pub use profile::Profile;
pub use registry::{Command, Handler, Registry};
pub use workspace::Workspace;
