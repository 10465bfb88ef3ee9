use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::cancel::Cancelled;

#[derive(Debug, Error)]
pub enum CopilotApiError {
    #[error("session bearer token is required")]
    MissingBearerToken,

    #[error("{0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out: {0}")]
    TimedOut(#[source] reqwest::Error),

    #[error("no response data for {0:?}")]
    Stalled(Duration),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("session bearer token was rejected: {0}")]
    Unauthorized(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for CopilotApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::TimedOut(error)
        } else {
            Self::Request(error)
        }
    }
}

impl From<Cancelled> for CopilotApiError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Reduce an HTTP error body to a single human-readable message.
///
/// Recognized shapes, in order: `{"error":{"message":..}}`, `{"message":..}`,
/// `{"error_description":..}`, `{"error":".."}`. Anything else falls back to
/// the raw body, then to the status reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("message"),
            value.get("error_description"),
            value.get("error"),
        ];
        if let Some(message) = candidates
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|message| !message.is_empty())
        {
            return message.to_owned();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
