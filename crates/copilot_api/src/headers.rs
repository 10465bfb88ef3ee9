use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::config::{CopilotApiConfig, EditorIdentity};
use crate::error::CopilotApiError;

pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_SESSION_ID: &str = "vscode-sessionid";
pub const HEADER_MACHINE_ID: &str = "machineid";
pub const HEADER_EDITOR_VERSION: &str = "editor-version";
pub const HEADER_EDITOR_PLUGIN_VERSION: &str = "editor-plugin-version";
pub const HEADER_OPENAI_ORGANIZATION: &str = "openai-organization";
pub const HEADER_OPENAI_INTENT: &str = "openai-intent";
pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Editor attribution headers shared by the chat, exchange and login calls.
pub fn editor_headers(editor: &EditorIdentity) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_EDITOR_VERSION.to_owned(),
        editor.editor_version.trim().to_owned(),
    );
    headers.insert(
        HEADER_EDITOR_PLUGIN_VERSION.to_owned(),
        editor.plugin_version.trim().to_owned(),
    );
    headers.insert(
        HEADER_USER_AGENT.to_owned(),
        editor.user_agent.trim().to_owned(),
    );
    headers
}

/// Build a deterministic header map for one chat completion request.
pub fn build_headers(
    config: &CopilotApiConfig,
    bearer_token: &str,
    request_id: &str,
) -> Result<BTreeMap<String, String>, CopilotApiError> {
    if bearer_token.trim().is_empty() {
        return Err(CopilotApiError::MissingBearerToken);
    }

    let mut headers = editor_headers(&config.editor);
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", bearer_token.trim()),
    );
    headers.insert(HEADER_REQUEST_ID.to_owned(), request_id.to_owned());
    headers.insert(
        HEADER_SESSION_ID.to_owned(),
        config.session_id.trim().to_owned(),
    );
    headers.insert(
        HEADER_MACHINE_ID.to_owned(),
        config.machine_id.trim().to_owned(),
    );
    headers.insert(
        HEADER_OPENAI_ORGANIZATION.to_owned(),
        "github-copilot".to_owned(),
    );
    headers.insert(
        HEADER_OPENAI_INTENT.to_owned(),
        "conversation-panel".to_owned(),
    );
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

/// Convert a string header map into a `reqwest` header map.
pub fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, CopilotApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        out.insert(
            HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| CopilotApiError::InvalidHeader(format!("invalid header key: {key}")))?,
            HeaderValue::from_str(value).map_err(|_| {
                CopilotApiError::InvalidHeader(format!("invalid header value for {key}"))
            })?,
        );
    }
    Ok(out)
}

/// Session correlation id: a UUID v4 followed by the epoch milliseconds.
#[must_use]
pub fn new_session_id() -> String {
    format!("{}{}", Uuid::new_v4(), current_epoch_ms())
}

#[must_use]
pub fn new_machine_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[must_use]
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn current_epoch_ms() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
