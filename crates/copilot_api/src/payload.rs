use serde::{Deserialize, Serialize};

/// Model identifier the chat endpoint expects.
pub const DEFAULT_MODEL: &str = "copilot-chat";
/// Low sampling temperature for technical answers.
pub const TEMPERATURE: f64 = 0.1;
/// Nucleus sampling disabled (full probability mass).
pub const TOP_P: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

/// One role-tagged prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub role: Role,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Code the user has selected, shown to the model apart from the chat turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttachment {
    pub code: String,
    pub language: Option<String>,
}

impl CodeAttachment {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Render as the fenced "active selection" system message body.
    pub fn render(&self) -> String {
        format!(
            "\nActive selection:\n```{}\n{}\n```",
            self.language.as_deref().unwrap_or(""),
            self.code
        )
    }
}

/// Wire payload for the chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub intent: bool,
    pub model: String,
    pub n: u32,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub messages: Vec<ChatMessage>,
}

/// Assemble the request payload for one completion.
///
/// The result always starts with exactly one system message carrying
/// `instructions` (empty when `None`), followed by `history` in order, then
/// an optional "active selection" system message when `attachment` holds
/// non-empty code.
pub fn build_request(
    history: &[ChatMessage],
    instructions: Option<&str>,
    attachment: Option<&CodeAttachment>,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(instructions.unwrap_or("")));
    messages.extend(history.iter().cloned());

    if let Some(attachment) = attachment.filter(|attachment| !attachment.code.is_empty()) {
        messages.push(ChatMessage::system(attachment.render()));
    }

    ChatRequest {
        intent: true,
        model: DEFAULT_MODEL.to_owned(),
        n: 1,
        stream: true,
        temperature: TEMPERATURE,
        top_p: TOP_P,
        messages,
    }
}
