//! Configuration system for the Micha engine.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Unknown or missing fields fall back to defaults so old config
//! files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CONFIG_FILE_NAME, Config, DebugConfig, LoopSettings, WindowConfig};
pub use error::ConfigError;
