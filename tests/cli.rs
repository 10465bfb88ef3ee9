use std::ffi::OsStr;
use std::fs;
use std::process::ExitCode;

use clap::Parser;
use copilot_chat::{run, Cli};

fn same_exit(left: ExitCode, right: ExitCode) -> bool {
    format!("{left:?}") == format!("{right:?}")
}

#[test]
fn missing_macro_fails_before_any_login() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = dir.path().join("tokens.json");
    let code = dir.path().join("main.rs");
    fs::write(&code, "fn main() {}").expect("write code");

    let cli = Cli::parse_from([
        OsStr::new("copilot-chat"),
        OsStr::new("--token-cache"),
        cache.as_os_str(),
        OsStr::new("macro"),
        dir.path().join("no-such-macro").as_os_str(),
        code.as_os_str(),
    ]);

    let exit = run(cli).expect("run");
    assert!(same_exit(exit, ExitCode::FAILURE));
    assert!(!cache.exists());
}

#[test]
fn empty_transcript_asks_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = dir.path().join("tokens.json");
    let transcript = dir.path().join("chat.md");
    fs::write(&transcript, "\n\n# === me ===\n   \n").expect("write transcript");

    let cli = Cli::parse_from([
        OsStr::new("copilot-chat"),
        OsStr::new("chat"),
        transcript.as_os_str(),
        OsStr::new("--token-cache"),
        cache.as_os_str(),
    ]);

    let exit = run(cli).expect("run");
    assert!(same_exit(exit, ExitCode::SUCCESS));
    assert!(!cache.exists());
}

#[test]
fn unreadable_transcript_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cli = Cli::parse_from([
        OsStr::new("copilot-chat"),
        OsStr::new("--token-cache"),
        dir.path().join("tokens.json").as_os_str(),
        OsStr::new("chat"),
        dir.path().join("missing.md").as_os_str(),
    ]);

    let error = run(cli).expect_err("missing transcript");
    assert!(format!("{error:#}").contains("failed to read transcript"));
}
