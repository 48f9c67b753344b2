pub mod commands;
pub mod config;

pub use commands::{execute, settle, CliCommand};
pub use config::CliConfig;
