use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use copilot_api::headers::{editor_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_USER_AGENT};
use copilot_api::{await_or_cancel, CancellationSignal, EditorIdentity};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::endpoints::{AuthEndpoints, GITHUB_CLIENT_ID, GITHUB_SCOPE};
use crate::error::AuthError;
use crate::token_cache::TokenStore;

/// Used when the server omits `expires_in`.
pub const DEFAULT_DEVICE_CODE_LIFETIME: Duration = Duration::from_secs(900);
/// Lower bound on the wait between polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Added to the interval on a `slow_down` response (RFC 8628 §3.5).
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Device code issued at the start of the flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub expires_in: u64,
}

impl DeviceCode {
    /// Operator instruction for approving this code.
    pub fn verification_prompt(&self) -> String {
        format!(
            "Please visit {} and enter {}",
            self.verification_uri, self.user_code
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval).max(MIN_POLL_INTERVAL)
    }

    pub fn lifetime(&self) -> Duration {
        if self.expires_in == 0 {
            DEFAULT_DEVICE_CODE_LIFETIME
        } else {
            Duration::from_secs(self.expires_in)
        }
    }
}

/// GitHub OAuth access token; this is the long-lived identity token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "bearer".to_owned(),
        }
    }

    fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Result of one token poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The operator has not approved the code yet.
    Pending,
    /// Polling too fast; `interval` is the server's new spacing, if given.
    SlowDown { interval: Option<Duration> },
    Approved(AccessToken),
}

/// Remote half of the device-code flow.
#[async_trait]
pub trait DeviceFlowApi: Send + Sync {
    async fn request_device_code(&self) -> Result<DeviceCode, AuthError>;
    async fn poll_access_token(&self, device_code: &str) -> Result<PollOutcome, AuthError>;
    async fn fetch_login(&self, token: &AccessToken) -> Result<String, AuthError>;
}

/// Supplies the long-lived GitHub identity token.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn identity_token(
        &self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<String, AuthError>;
}

/// [`DeviceFlowApi`] over GitHub's OAuth endpoints.
#[derive(Debug)]
pub struct GithubDeviceFlow {
    http: Client,
    endpoints: AuthEndpoints,
    editor: EditorIdentity,
}

impl GithubDeviceFlow {
    pub fn new(endpoints: AuthEndpoints, timeout: Option<Duration>) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|source| AuthError::request("building the HTTP client", source))?;
        Ok(Self {
            http,
            endpoints,
            editor: EditorIdentity::login(),
        })
    }

    fn login_headers(&self) -> BTreeMap<String, String> {
        let mut headers = editor_headers(&self.editor);
        headers.insert(HEADER_ACCEPT.to_owned(), "application/json".to_owned());
        headers
    }
}

#[async_trait]
impl DeviceFlowApi for GithubDeviceFlow {
    async fn request_device_code(&self) -> Result<DeviceCode, AuthError> {
        const STEP: &str = "requesting a device code";
        let request = self
            .http
            .post(&self.endpoints.device_code_url)
            .json(&json!({ "client_id": GITHUB_CLIENT_ID, "scope": GITHUB_SCOPE }));
        let response = send_checked(with_headers(request, &self.login_headers()), STEP).await?;
        response
            .json::<DeviceCode>()
            .await
            .map_err(|source| AuthError::request(STEP, source))
    }

    async fn poll_access_token(&self, device_code: &str) -> Result<PollOutcome, AuthError> {
        const STEP: &str = "polling for an access token";
        let request = self.http.post(&self.endpoints.access_token_url).json(&json!({
            "client_id": GITHUB_CLIENT_ID,
            "device_code": device_code,
            "grant_type": DEVICE_GRANT_TYPE,
        }));
        let response = send_checked(with_headers(request, &self.login_headers()), STEP).await?;
        let body = response
            .json::<PollBody>()
            .await
            .map_err(|source| AuthError::request(STEP, source))?;
        poll_outcome(body)
    }

    async fn fetch_login(&self, token: &AccessToken) -> Result<String, AuthError> {
        const STEP: &str = "looking up the GitHub login";
        let request = self
            .http
            .get(&self.endpoints.user_url)
            .header(HEADER_AUTHORIZATION, token.authorization())
            .header(HEADER_USER_AGENT, self.editor.user_agent.as_str())
            .header(HEADER_ACCEPT, "application/json");
        let response = send_checked(request, STEP).await?;
        let user = response
            .json::<GithubUser>()
            .await
            .map_err(|source| AuthError::request(STEP, source))?;
        Ok(user.login)
    }
}

type PromptFn = dyn Fn(&DeviceCode) + Send + Sync;

/// Runs the device-code handshake and caches the resulting identity token.
pub struct DeviceCodeAuthenticator {
    api: Arc<dyn DeviceFlowApi>,
    store: Arc<dyn TokenStore>,
    prompt: Arc<PromptFn>,
    timeout: Option<Duration>,
}

impl DeviceCodeAuthenticator {
    pub fn new(api: Arc<dyn DeviceFlowApi>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            prompt: Arc::new(print_verification_prompt),
            timeout: None,
        }
    }

    /// Replace how the verification URI and user code reach the operator.
    #[must_use]
    pub fn with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&DeviceCode) + Send + Sync + 'static,
    {
        self.prompt = Arc::new(prompt);
        self
    }

    /// Stop polling after `timeout` even if the device code is still valid.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Run the full flow: request a code, show it, poll until approved,
    /// resolve the login and cache `(login, token)`.
    pub async fn authenticate(
        &self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<String, AuthError> {
        let device = await_or_cancel(self.api.request_device_code(), cancellation).await??;
        (self.prompt)(&device);
        info!(
            verification_uri = %device.verification_uri,
            interval_secs = device.interval,
            "waiting for device authorization"
        );

        let access = self.poll_until_approved(&device, cancellation).await?;
        self.remember(&access, cancellation).await?;
        Ok(access.access_token)
    }

    /// Poll once for a device code issued elsewhere; caches the token on approval.
    pub async fn complete_device_code(
        &self,
        device_code: &str,
    ) -> Result<Option<String>, AuthError> {
        match self.api.poll_access_token(device_code.trim()).await? {
            PollOutcome::Approved(access) => {
                self.remember(&access, None).await?;
                Ok(Some(access.access_token))
            }
            PollOutcome::Pending | PollOutcome::SlowDown { .. } => Ok(None),
        }
    }

    async fn poll_until_approved(
        &self,
        device: &DeviceCode,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<AccessToken, AuthError> {
        let lifetime = match self.timeout {
            Some(timeout) => timeout.min(device.lifetime()),
            None => device.lifetime(),
        };
        let deadline = Instant::now() + lifetime;
        let mut interval = device.poll_interval();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome =
                await_or_cancel(self.api.poll_access_token(&device.device_code), cancellation)
                    .await??;
            match outcome {
                PollOutcome::Approved(access) => {
                    debug!(attempts, "device authorization approved");
                    return Ok(access);
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown { interval: next } => {
                    interval = next.unwrap_or(interval + SLOW_DOWN_STEP).max(MIN_POLL_INTERVAL);
                    debug!(interval_secs = interval.as_secs(), "server asked to slow down");
                }
            }

            if Instant::now() + interval > deadline {
                return Err(AuthError::DeviceCodeExpired);
            }
            await_or_cancel(tokio::time::sleep(interval), cancellation).await?;
        }
    }

    async fn remember(
        &self,
        access: &AccessToken,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<String, AuthError> {
        let login = await_or_cancel(self.api.fetch_login(access), cancellation).await??;
        self.store.put(&login, &access.access_token)?;
        info!(%login, "cached GitHub identity token");
        Ok(login)
    }
}

#[async_trait]
impl IdentitySource for DeviceCodeAuthenticator {
    async fn identity_token(
        &self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<String, AuthError> {
        if let Some(token) = self.store.get(None)? {
            debug!("using cached GitHub identity token");
            return Ok(token);
        }
        self.authenticate(cancellation).await
    }
}

fn print_verification_prompt(device: &DeviceCode) {
    eprintln!("{}", device.verification_prompt());
}

#[derive(Debug, Deserialize)]
struct PollBody {
    access_token: Option<String>,
    token_type: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

/// Map a token-poll body onto a [`PollOutcome`].
///
/// A body with neither a token nor an error code counts as pending.
fn poll_outcome(body: PollBody) -> Result<PollOutcome, AuthError> {
    if let Some(access_token) = body.access_token.filter(|token| !token.trim().is_empty()) {
        return Ok(PollOutcome::Approved(AccessToken {
            access_token,
            token_type: body
                .token_type
                .filter(|kind| !kind.trim().is_empty())
                .unwrap_or_else(|| "bearer".to_owned()),
        }));
    }

    match body.error.as_deref() {
        None | Some("authorization_pending") => Ok(PollOutcome::Pending),
        Some("slow_down") => Ok(PollOutcome::SlowDown {
            interval: body.interval.map(Duration::from_secs),
        }),
        Some("expired_token") => Err(AuthError::DeviceCodeExpired),
        Some("access_denied") => Err(AuthError::AccessDenied),
        Some(code) => Err(AuthError::PollFailed(
            body.error_description.unwrap_or_else(|| code.to_owned()),
        )),
    }
}

pub(crate) fn with_headers(builder: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    headers
        .iter()
        .fold(builder, |builder, (key, value)| builder.header(key.as_str(), value.as_str()))
}

pub(crate) async fn send_checked(request: RequestBuilder, step: &'static str) -> Result<Response, AuthError> {
    let response = request
        .send()
        .await
        .map_err(|source| AuthError::request(step, source))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AuthError::http(
        step,
        status,
        copilot_api::error::parse_error_message(status, &body),
    ))
}
