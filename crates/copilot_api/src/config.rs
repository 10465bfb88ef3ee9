use std::collections::BTreeMap;
use std::time::Duration;

use crate::headers::{new_machine_id, new_session_id};

/// Default base URL for chat completion requests.
pub const DEFAULT_COPILOT_BASE_URL: &str = "https://api.githubcopilot.com";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Editor attribution sent with every call the remote service bills to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorIdentity {
    pub editor_version: String,
    pub plugin_version: String,
    pub user_agent: String,
}

impl EditorIdentity {
    /// Identity used for the token exchange and chat completion APIs.
    #[must_use]
    pub fn chat() -> Self {
        Self {
            editor_version: "vscode/1.80.1".to_owned(),
            plugin_version: "copilot-chat/0.4.1".to_owned(),
            user_agent: "GitHubCopilotChat/0.4.1".to_owned(),
        }
    }

    /// Identity used for the GitHub device-code login endpoints.
    #[must_use]
    pub fn login() -> Self {
        Self {
            editor_version: "Neovim/0.9.2".to_owned(),
            plugin_version: "copilot.lua/1.11.4".to_owned(),
            user_agent: "GithubCopilot/1.133.0".to_owned(),
        }
    }
}

impl Default for EditorIdentity {
    fn default() -> Self {
        Self::chat()
    }
}

/// Transport configuration for chat completion requests.
#[derive(Debug, Clone)]
pub struct CopilotApiConfig {
    /// Base URL for the chat API.
    pub base_url: String,
    /// Correlation id sent as `vscode-sessionid`; fixed for the client lifetime.
    pub session_id: String,
    /// Per-process machine id sent as `machineid`.
    pub machine_id: String,
    /// Editor attribution headers.
    pub editor: EditorIdentity,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional limit on connecting, on waiting for response headers and on
    /// each gap between streamed chunks.
    pub timeout: Option<Duration>,
}

impl Default for CopilotApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COPILOT_BASE_URL.to_string(),
            session_id: new_session_id(),
            machine_id: new_machine_id(),
            editor: EditorIdentity::chat(),
            extra_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl CopilotApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = machine_id.into();
        self
    }

    pub fn with_editor(mut self, editor: EditorIdentity) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Completions endpoint under `base_url`; a blank base falls back to the default.
    pub fn chat_completions_url(&self) -> String {
        let base = match self.base_url.trim() {
            "" => DEFAULT_COPILOT_BASE_URL,
            base => base,
        };
        let base = base.trim_end_matches('/');
        if base.ends_with(CHAT_COMPLETIONS_PATH) {
            base.to_owned()
        } else {
            format!("{base}{CHAT_COMPLETIONS_PATH}")
        }
    }
}
