use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token cache at {path} is corrupt: {source}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize token cache for {path}: {source}")]
    CacheSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot locate the home directory for the token cache")]
    NoHomeDir,

    #[error("request error while {step}: {source}")]
    Request {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} while {step}: {message}")]
    Http {
        step: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("device authorization was denied")]
    AccessDenied,

    #[error("device code expired before authorization completed")]
    DeviceCodeExpired,

    #[error("device authorization failed: {0}")]
    PollFailed(String),

    #[error("no GitHub identity token available")]
    MissingIdentityToken,

    #[error("token exchange returned an empty session token")]
    EmptySessionToken,

    #[error("authentication was cancelled")]
    Cancelled,
}

impl AuthError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn request(step: &'static str, source: reqwest::Error) -> Self {
        Self::Request { step, source }
    }

    #[must_use]
    pub fn http(step: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            step,
            status,
            message: message.into(),
        }
    }
}

impl From<copilot_api::Cancelled> for AuthError {
    fn from(_: copilot_api::Cancelled) -> Self {
        Self::Cancelled
    }
}
