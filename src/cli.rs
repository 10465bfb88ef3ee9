use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(
    name = "copilot-chat",
    version,
    about = "Ask GitHub Copilot Chat from the command line"
)]
pub struct Cli {
    /// Token cache file (default: ~/.config/.copilot, or COPILOT_CHAT_TOKEN_CACHE)
    #[arg(long, global = true, value_name = "PATH")]
    pub token_cache: Option<PathBuf>,

    /// Network timeout in seconds (default: 120, or COPILOT_CHAT_TIMEOUT_SEC)
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_sec: Option<u64>,

    /// System instructions sent before the conversation (or COPILOT_CHAT_INSTRUCTIONS)
    #[arg(long, global = true, value_name = "TEXT")]
    pub instructions: Option<String>,

    /// Log debug details to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Finish a device login started elsewhere by polling once for its code
    Connect {
        /// Device code issued by the login endpoint
        device_code: String,
    },
    /// Sign in with a GitHub device code and cache the token
    Login,
    /// Answer the last turn of a transcript file
    Chat {
        /// Transcript with `# === NAME ===` turn headers
        transcript: PathBuf,
        /// Print answer fragments as they arrive
        #[arg(long, default_value_t = false)]
        stream: bool,
    },
    /// Apply a macro file to a code file and print only the resulting code
    Macro {
        /// File holding the macro instructions
        macro_file: PathBuf,
        /// File holding the code to transform
        code_file: PathBuf,
        /// Language tag for the attached code
        #[arg(long)]
        language: Option<String>,
    },
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            token_cache: self.token_cache.clone(),
            timeout_sec: self.timeout_sec,
            instructions: self.instructions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "copilot-chat",
            "chat",
            "notes.md",
            "--stream",
            "--timeout-sec",
            "30",
            "-v",
        ])
        .expect("parse");

        assert!(cli.verbose);
        assert_eq!(cli.overrides().timeout_sec, Some(30));
        match cli.command {
            Command::Chat { transcript, stream } => {
                assert_eq!(transcript, PathBuf::from("notes.md"));
                assert!(stream);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn macro_takes_two_paths_and_optional_language() {
        let cli = Cli::try_parse_from([
            "copilot-chat",
            "macro",
            "refactor.txt",
            "main.rs",
            "--language",
            "rust",
        ])
        .expect("parse");

        match cli.command {
            Command::Macro {
                macro_file,
                code_file,
                language,
            } => {
                assert_eq!(macro_file, PathBuf::from("refactor.txt"));
                assert_eq!(code_file, PathBuf::from("main.rs"));
                assert_eq!(language.as_deref(), Some("rust"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
