//! CLI commands module.

mod config;
mod serve;
mod templates;
mod util;
mod verify;

pub use config::ConfigCommand;
pub use serve::ServeCommand;
pub use templates::TemplatesCommand;
pub use verify::VerifyCommand;

// Re-export utils for use in commands
pub(crate) use util::*;
