use async_trait::async_trait;
use copilot_api::{CancellationSignal, ChatAnswer, ChatRequest, CopilotApiClient, CopilotApiError};

/// Streaming chat completion seam between the session and the wire client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Correlation id sent with every request of this transport.
    fn session_id(&self) -> &str;

    async fn stream_chat(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<ChatAnswer, CopilotApiError>;
}

#[async_trait]
impl ChatTransport for CopilotApiClient {
    fn session_id(&self) -> &str {
        CopilotApiClient::session_id(self)
    }

    async fn stream_chat(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<ChatAnswer, CopilotApiError> {
        self.stream_with_handler(bearer_token, request, cancellation, |fragment| {
            on_fragment(fragment)
        })
        .await
    }
}
