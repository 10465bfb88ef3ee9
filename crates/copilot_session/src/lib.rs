//! Conversation state and the chat session orchestrator.
//!
//! A [`Session`] resolves a GitHub identity token, trades it for a chat
//! bearer token and then answers prompts against its own [`Conversation`].
//! Both answers and service-reported errors are appended back to the
//! conversation, so follow-up prompts see them as context.

mod conversation;
mod error;
mod session;
mod transport;

pub use conversation::Conversation;
pub use error::SessionError;
pub use session::Session;
pub use transport::ChatTransport;
