//! Transcript files: turns separated by `# === NAME ===` header lines.
//!
//! Text before the first header belongs to the system role. Headers naming
//! `AI`, `COPILOT` or `SYSTEM` (any case) start a system turn, any other name
//! starts a user turn. The last turn is the prompt to ask; everything before
//! it is conversation history.

use std::sync::OnceLock;

use copilot_api::{ChatMessage, Role};
use regex::Regex;

const SYSTEM_SPEAKERS: [&str; 3] = ["ai", "copilot", "system"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub history: Vec<ChatMessage>,
    pub prompt: Option<String>,
}

fn header_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^#\s*===(?P<name>.*)===\s*$").expect("transcript header regex must compile")
    })
}

/// Role a header line switches to, or `None` for a body line.
pub fn header_role(line: &str) -> Option<Role> {
    let captures = header_regex().captures(line)?;
    let name = captures["name"].trim_matches('=').trim().to_ascii_lowercase();
    if SYSTEM_SPEAKERS.contains(&name.as_str()) {
        Some(Role::System)
    } else {
        Some(Role::User)
    }
}

/// Split `raw` into role-tagged turns; blank turns are dropped.
pub fn turns(raw: &str) -> Vec<ChatMessage> {
    let mut turns = Vec::new();
    let mut role = Role::System;
    let mut lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        match header_role(line) {
            Some(next) => {
                push_turn(&mut turns, role, &lines);
                lines.clear();
                role = next;
            }
            None => lines.push(line),
        }
    }
    push_turn(&mut turns, role, &lines);
    turns
}

pub fn parse(raw: &str) -> Transcript {
    let mut history = turns(raw);
    let prompt = history.pop().map(|turn| turn.content);
    Transcript { history, prompt }
}

fn push_turn(turns: &mut Vec<ChatMessage>, role: Role, lines: &[&str]) {
    let text = lines.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        turns.push(ChatMessage::new(role, text));
    }
}
