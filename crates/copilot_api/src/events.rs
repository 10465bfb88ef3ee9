use std::fmt;

/// Error object embedded in the completion stream by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceError {
    pub message: Option<String>,
    pub details: Option<String>,
}

impl ServiceError {
    /// Present fields joined by a blank line, `message` first.
    pub fn text(&self) -> String {
        [self.message.as_deref(), self.details.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Classification of one `data:` frame body, decided once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A non-empty content fragment at `choices[0].delta.content`.
    Content(String),
    /// Valid JSON that carries neither content nor an error (role deltas,
    /// finish markers, heartbeats).
    Empty,
    /// A service-reported error; ends decoding.
    Error(ServiceError),
    /// Not parseable as JSON; skipped.
    Malformed,
    /// The `[DONE]` sentinel; ends decoding.
    Terminal,
}

/// Final result of decoding one completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAnswer {
    Reply(String),
    ServiceError(ServiceError),
}

impl ChatAnswer {
    /// The answer text; for service errors, message and details joined.
    pub fn text(&self) -> String {
        match self {
            Self::Reply(text) => text.clone(),
            Self::ServiceError(error) => error.text(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Reply(text) => text,
            Self::ServiceError(error) => error.text(),
        }
    }

    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::ServiceError(_))
    }
}

impl fmt::Display for ChatAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(text) => f.write_str(text),
            Self::ServiceError(error) => f.write_str(&error.text()),
        }
    }
}
