use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use copilot_api::headers::{editor_headers, HEADER_AUTHORIZATION};
use copilot_api::EditorIdentity;
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::device_flow::{send_checked, with_headers};
use crate::endpoints::AuthEndpoints;
use crate::error::AuthError;

/// Short-lived bearer token scoped to the chat API.
///
/// A session exchanges the token again once `expires_at` has passed, or
/// when a request is rejected before then.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_in: Option<u64>,
}

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
            refresh_in: None,
        }
    }

    /// Whether the server-declared expiry (unix seconds) has passed at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now.unix_timestamp() >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh_in", &self.refresh_in)
            .finish()
    }
}

/// Trades the GitHub identity token for a chat bearer token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, identity_token: &str) -> Result<SessionToken, AuthError>;
}

/// [`TokenExchanger`] over the Copilot internal token endpoint.
#[derive(Debug)]
pub struct CopilotTokenExchange {
    http: Client,
    url: String,
    editor: EditorIdentity,
}

impl CopilotTokenExchange {
    pub fn new(endpoints: &AuthEndpoints, timeout: Option<Duration>) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|source| AuthError::request("building the HTTP client", source))?;
        Ok(Self {
            http,
            url: endpoints.token_exchange_url.clone(),
            editor: EditorIdentity::chat(),
        })
    }

    #[must_use]
    pub fn with_editor(mut self, editor: EditorIdentity) -> Self {
        self.editor = editor;
        self
    }
}

#[async_trait]
impl TokenExchanger for CopilotTokenExchange {
    async fn exchange(&self, identity_token: &str) -> Result<SessionToken, AuthError> {
        const STEP: &str = "exchanging the GitHub token for a session token";
        let identity_token = identity_token.trim();
        if identity_token.is_empty() {
            return Err(AuthError::MissingIdentityToken);
        }

        let request = self
            .http
            .get(&self.url)
            .header(HEADER_AUTHORIZATION, format!("token {identity_token}"));
        let request = with_headers(request, &editor_headers(&self.editor));
        let response = send_checked(request, STEP).await?;
        let token = response
            .json::<SessionToken>()
            .await
            .map_err(|source| AuthError::request(STEP, source))?;

        if token.token.trim().is_empty() {
            return Err(AuthError::EmptySessionToken);
        }
        debug!(expires_at = ?token.expires_at, "obtained session token");
        Ok(token)
    }
}
