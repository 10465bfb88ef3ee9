//! Command-line bridge to the Copilot chat API.
//!
//! The binary wires the workspace crates together: `copilot_auth` for the
//! GitHub login and session token, `copilot_api` for the streamed completion
//! call and `copilot_session` for the conversation. This crate adds the
//! operator-facing layer: argument parsing, settings, transcript and macro
//! files, logging and exit codes.

pub mod app;
pub mod cli;
pub mod config;
pub mod instructions;
pub mod logging;
pub mod macro_mode;
pub mod transcript;

pub use app::run;
pub use cli::{Cli, Command};
pub use config::{ConfigError, Overrides, Settings};
