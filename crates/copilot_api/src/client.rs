use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::cancel::{await_or_cancel, is_cancelled, CancellationSignal};
use crate::config::CopilotApiConfig;
use crate::error::{parse_error_message, CopilotApiError};
use crate::events::ChatAnswer;
use crate::headers::{build_headers, new_request_id, to_header_map};
use crate::payload::ChatRequest;
use crate::sse::FrameDecoder;

#[derive(Debug)]
pub struct CopilotApiClient {
    http: Client,
    config: CopilotApiConfig,
}

impl CopilotApiClient {
    pub fn new(config: CopilotApiConfig) -> Result<Self, CopilotApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(CopilotApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CopilotApiConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn endpoint(&self) -> String {
        self.config.chat_completions_url()
    }

    /// Build the POST for one completion; every call gets a fresh request id.
    pub fn build_request(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, CopilotApiError> {
        let request_id = new_request_id();
        let headers = build_headers(&self.config, bearer_token, &request_id)?;
        let headers = to_header_map(&headers)?;
        Ok(self
            .http
            .post(self.endpoint())
            .headers(headers)
            .json(request))
    }

    /// Send a completion request and return the response once its status is known.
    ///
    /// The configured timeout bounds the wait for response headers here and
    /// each gap between body chunks while streaming, never the whole answer.
    ///
    /// A 401 maps to [`CopilotApiError::Unauthorized`] so callers can re-exchange
    /// the bearer token; any other non-success status is an error carrying the
    /// parsed body message.
    pub async fn send(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, CopilotApiError> {
        if is_cancelled(cancellation) {
            return Err(CopilotApiError::Cancelled);
        }

        let pending = within(self.config.timeout, self.build_request(bearer_token, request)?.send());
        let response = await_or_cancel(pending, cancellation).await???;
        let status = response.status();
        debug!(%status, messages = request.messages.len(), "chat completion response");
        if status.is_success() {
            return Ok(response);
        }

        let body = within(self.config.timeout, response.text());
        let body = await_or_cancel(body, cancellation)
            .await??
            .unwrap_or_default();
        let message = parse_error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            return Err(CopilotApiError::Unauthorized(message));
        }
        Err(CopilotApiError::Status(status, message))
    }

    /// Stream one completion, reporting each content fragment as it completes.
    pub async fn stream_with_handler<F>(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_fragment: F,
    ) -> Result<ChatAnswer, CopilotApiError>
    where
        F: FnMut(&str),
    {
        let response = self.send(bearer_token, request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut decoder = FrameDecoder::default();

        while !decoder.is_finished() {
            let next = within(self.config.timeout, bytes.next());
            let Some(chunk) = await_or_cancel(next, cancellation).await?? else {
                break;
            };
            let chunk = chunk.map_err(CopilotApiError::from)?;
            for fragment in decoder.feed(&chunk) {
                on_fragment(&fragment);
            }
        }

        if is_cancelled(cancellation) {
            return Err(CopilotApiError::Cancelled);
        }

        for fragment in decoder.flush() {
            on_fragment(&fragment);
        }
        Ok(decoder.into_answer())
    }

    /// Stream one completion and return only the final answer.
    pub async fn complete(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatAnswer, CopilotApiError> {
        self.stream_with_handler(bearer_token, request, cancellation, |_| {})
            .await
    }
}

/// Await `future`, failing with [`CopilotApiError::Stalled`] after `limit`.
async fn within<F>(limit: Option<Duration>, future: F) -> Result<F::Output, CopilotApiError>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| CopilotApiError::Stalled(limit)),
        None => Ok(future.await),
    }
}
