//! Runtime settings: command-line flags first, then environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use copilot_auth::{default_token_cache_path, AuthError};
use thiserror::Error;

use crate::instructions::{resolve_instructions, INSTRUCTIONS_ENV_VAR};

pub const TOKEN_CACHE_ENV_VAR: &str = "COPILOT_CHAT_TOKEN_CACHE";
pub const TIMEOUT_ENV_VAR: &str = "COPILOT_CHAT_TIMEOUT_SEC";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {source_name} value '{value}': expected a positive number of seconds")]
    InvalidTimeout { source_name: String, value: String },

    #[error(transparent)]
    TokenCache(#[from] AuthError),
}

/// Values given on the command line; `None` falls through to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub token_cache: Option<PathBuf>,
    pub timeout_sec: Option<u64>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token_cache: PathBuf,
    pub timeout: Duration,
    pub instructions: String,
}

impl Settings {
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    /// Resolve settings against `lookup`, which stands in for the process
    /// environment.
    pub fn resolve<F>(overrides: Overrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token_cache = match overrides
            .token_cache
            .or_else(|| non_blank(TOKEN_CACHE_ENV_VAR).map(PathBuf::from))
        {
            Some(path) => path,
            None => default_token_cache_path()?,
        };

        let timeout = match overrides.timeout_sec {
            Some(0) => {
                return Err(ConfigError::InvalidTimeout {
                    source_name: "--timeout-sec".to_owned(),
                    value: "0".to_owned(),
                })
            }
            Some(seconds) => Duration::from_secs(seconds),
            None => match non_blank(TIMEOUT_ENV_VAR) {
                Some(raw) => parse_timeout(TIMEOUT_ENV_VAR, &raw)?,
                None => DEFAULT_TIMEOUT,
            },
        };

        let instructions = overrides
            .instructions
            .or_else(|| non_blank(INSTRUCTIONS_ENV_VAR));

        Ok(Self {
            token_cache,
            timeout,
            instructions: resolve_instructions(instructions.as_deref()),
        })
    }
}

fn parse_timeout(source_name: &str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::InvalidTimeout {
            source_name: source_name.to_owned(),
            value: raw.to_owned(),
        }),
    }
}
