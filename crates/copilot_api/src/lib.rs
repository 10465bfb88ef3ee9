//! Transport-only client primitives for the Copilot chat completion API.
//!
//! This crate owns request building, header construction and incremental
//! decoding of the `data:`-framed completion stream. It contains no login or
//! token-exchange code: callers hand every request a session bearer token
//! obtained elsewhere.
//!
//! Stream decoding is tolerant by contract. Malformed frames are skipped,
//! the `[DONE]` sentinel ends the answer, and a service-reported `error`
//! frame replaces the answer with [`ChatAnswer::ServiceError`].

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;

pub use cancel::{await_or_cancel, is_cancelled, CancellationSignal, Cancelled};
pub use client::CopilotApiClient;
pub use config::{CopilotApiConfig, EditorIdentity, DEFAULT_COPILOT_BASE_URL};
pub use error::CopilotApiError;
pub use events::{ChatAnswer, ServiceError, StreamFrame};
pub use payload::{build_request, ChatMessage, ChatRequest, CodeAttachment, Role};
pub use sse::{classify_frame, decode_body, decode_chunks, FrameDecoder};
