use std::sync::Arc;

use copilot_api::{
    build_request, CancellationSignal, ChatAnswer, CodeAttachment, CopilotApiError, Role,
};
use copilot_auth::{IdentitySource, SessionToken, TokenExchanger};
use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::error::SessionError;
use crate::transport::ChatTransport;

/// One chat session: credentials, conversation and transport.
///
/// The session must be authenticated before the first [`Session::ask`].
/// A bearer token past its declared expiry is exchanged again before the
/// request; a rejected request triggers one re-exchange and one retry.
pub struct Session {
    identity: Arc<dyn IdentitySource>,
    exchanger: Arc<dyn TokenExchanger>,
    transport: Arc<dyn ChatTransport>,
    instructions: Option<String>,
    conversation: Conversation,
    identity_token: Option<String>,
    bearer: Option<SessionToken>,
}

impl Session {
    pub fn new(
        identity: Arc<dyn IdentitySource>,
        exchanger: Arc<dyn TokenExchanger>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            identity,
            exchanger,
            transport,
            instructions: None,
            conversation: Conversation::new(),
            identity_token: None,
            bearer: None,
        }
    }

    /// System instructions sent as the first message of every request.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn session_id(&self) -> &str {
        self.transport.session_id()
    }

    pub fn is_ready(&self) -> bool {
        self.bearer.is_some()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn add_message(&mut self, content: impl Into<String>, role: Role) {
        self.conversation.append(content, role);
    }

    /// Resolve the identity token and exchange it for a bearer token.
    pub async fn authenticate(
        &mut self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), SessionError> {
        let identity_token = self.identity.identity_token(cancellation).await?;
        let bearer = self.exchanger.exchange(&identity_token).await?;
        info!(session_id = %self.session_id(), "session authenticated");
        self.identity_token = Some(identity_token);
        self.bearer = Some(bearer);
        Ok(())
    }

    /// Authenticate unless a bearer token is already held.
    pub async fn ensure_ready(
        &mut self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), SessionError> {
        if self.is_ready() {
            return Ok(());
        }
        self.authenticate(cancellation).await
    }

    /// Ask `prompt` and return the final answer.
    pub async fn ask(
        &mut self,
        prompt: &str,
        attachment: Option<&CodeAttachment>,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatAnswer, SessionError> {
        self.ask_streaming(prompt, attachment, cancellation, &mut |_: &str| {})
            .await
    }

    /// Ask `prompt`, reporting content fragments as they arrive.
    ///
    /// The prompt is appended as a user message before the request is sent
    /// and stays in the conversation if the request fails. The answer text,
    /// including a service-reported error, is appended as a system message.
    pub async fn ask_streaming(
        &mut self,
        prompt: &str,
        attachment: Option<&CodeAttachment>,
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ChatAnswer, SessionError> {
        let bearer = match &self.bearer {
            None => return Err(SessionError::NotAuthenticated),
            Some(token) if token.is_expired() => {
                info!(expires_at = ?token.expires_at, "session token expired, exchanging again");
                self.reexchange().await?
            }
            Some(token) => token.token.clone(),
        };

        self.conversation.append(prompt, Role::User);
        let request = build_request(
            self.conversation.messages(),
            self.instructions.as_deref(),
            attachment,
        );
        debug!(messages = request.messages.len(), "asking");

        let answer = match self
            .transport
            .stream_chat(&bearer, &request, cancellation, on_fragment)
            .await
        {
            Err(CopilotApiError::Unauthorized(message)) => {
                warn!(%message, "bearer token rejected, exchanging again");
                let bearer = self.reexchange().await?;
                self.transport
                    .stream_chat(&bearer, &request, cancellation, on_fragment)
                    .await?
            }
            other => other?,
        };

        if answer.is_service_error() {
            warn!(error = %answer, "service reported an error");
        }
        self.conversation.append(answer.text(), Role::System);
        Ok(answer)
    }

    async fn reexchange(&mut self) -> Result<String, SessionError> {
        let identity_token = self
            .identity_token
            .as_deref()
            .ok_or(SessionError::NotAuthenticated)?;
        let bearer = self.exchanger.exchange(identity_token).await?;
        let token = bearer.token.clone();
        self.bearer = Some(bearer);
        Ok(token)
    }
}
