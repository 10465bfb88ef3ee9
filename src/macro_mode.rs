//! Macro mode: apply an instruction file to a code file and keep only code.

use copilot_api::{ChatMessage, CodeAttachment};

/// Printed, with a non-zero exit, when the macro file does not exist.
pub const MISSING_MACRO_MESSAGE: &str = "This macro does not exist...";

pub const CODE_ONLY_PREAMBLE: &str = "From now on, only the code will be kept from your answer, so if you give additional information, do it in the form of comments in the code itself.\nRemember to always delimit your code with 3 backticks (```).";

const FENCE: &str = "```";

/// Everything a macro run sends: seeded history, prompt and attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroRequest {
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    pub attachment: CodeAttachment,
}

impl MacroRequest {
    pub fn new(instructions: &str, code: &str, language: Option<&str>) -> Self {
        let mut attachment = CodeAttachment::new(code);
        if let Some(language) = language.map(str::trim).filter(|value| !value.is_empty()) {
            attachment = attachment.with_language(language);
        }

        Self {
            history: vec![
                ChatMessage::system(CODE_ONLY_PREAMBLE),
                ChatMessage::user(analysis_message(code, instructions)),
            ],
            prompt: instructions.to_owned(),
            attachment,
        }
    }
}

pub fn analysis_message(code: &str, instructions: &str) -> String {
    format!("Analysed code : \n{code}\n\nInstructions:\n{instructions}")
}

/// Lines strictly inside the first fenced block of `answer`.
///
/// An unterminated block runs to the end of the answer; an answer without
/// any fence yields nothing.
pub fn first_code_block(answer: &str) -> Vec<&str> {
    let mut lines = answer.lines();
    if !lines.by_ref().any(|line| line.starts_with(FENCE)) {
        return Vec::new();
    }
    lines.take_while(|line| !line.starts_with(FENCE)).collect()
}
