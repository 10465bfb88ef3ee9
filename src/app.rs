use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use copilot_api::cancel::{is_cancelled, new_signal};
use copilot_api::{CancellationSignal, ChatAnswer, CopilotApiClient, CopilotApiConfig};
use copilot_auth::{
    AuthEndpoints, CopilotTokenExchange, DeviceCodeAuthenticator, FileTokenStore, GithubDeviceFlow,
};
use copilot_session::Session;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use tracing::{debug, warn};

use crate::cli::{Cli, Command};
use crate::config::Settings;
use crate::macro_mode::{first_code_block, MacroRequest, MISSING_MACRO_MESSAGE};
use crate::transcript;

/// Exit status after an operator interrupt.
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Run one command to completion and report how the process should exit.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::from_env(cli.overrides()).context("invalid configuration")?;
    debug!(token_cache = %settings.token_cache.display(), timeout = ?settings.timeout, "resolved settings");

    let cancellation = install_interrupt_handler()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;

    let outcome = runtime.block_on(dispatch(cli.command, &settings, &cancellation));
    if is_cancelled(Some(&cancellation)) {
        eprintln!("Interrupted");
        return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
    }
    outcome
}

async fn dispatch(
    command: Command,
    settings: &Settings,
    cancellation: &CancellationSignal,
) -> Result<ExitCode> {
    match command {
        Command::Connect { device_code } => connect(&device_code, settings).await,
        Command::Login => login(settings, cancellation).await,
        Command::Chat { transcript, stream } => {
            chat(&transcript, stream, settings, cancellation).await
        }
        Command::Macro {
            macro_file,
            code_file,
            language,
        } => {
            run_macro(
                &macro_file,
                &code_file,
                language.as_deref(),
                settings,
                cancellation,
            )
            .await
        }
    }
}

async fn connect(device_code: &str, settings: &Settings) -> Result<ExitCode> {
    let authenticator = authenticator(settings)?;
    match authenticator
        .complete_device_code(device_code)
        .await
        .context("device login failed")?
    {
        Some(_) => {
            eprintln!("Successfully authenticated");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Authorization is still pending; approve the code and try again");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn login(settings: &Settings, cancellation: &CancellationSignal) -> Result<ExitCode> {
    authenticator(settings)?
        .authenticate(Some(cancellation))
        .await
        .context("device login failed")?;
    eprintln!("Successfully authenticated");
    Ok(ExitCode::SUCCESS)
}

async fn chat(
    path: &Path,
    stream: bool,
    settings: &Settings,
    cancellation: &CancellationSignal,
) -> Result<ExitCode> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript {}", path.display()))?;
    let transcript = transcript::parse(&raw);
    let Some(prompt) = transcript.prompt else {
        warn!(path = %path.display(), "transcript has no turns, nothing to ask");
        return Ok(ExitCode::SUCCESS);
    };

    let mut session = build_session(settings)?;
    for message in transcript.history {
        session.add_message(message.content, message.role);
    }
    session
        .ensure_ready(Some(cancellation))
        .await
        .context("authentication failed")?;

    if stream {
        let mut writer = FragmentWriter::new(io::stdout());
        let answer = session
            .ask_streaming(&prompt, None, Some(cancellation), &mut |fragment: &str| {
                writer.write(fragment)
            })
            .await
            .context("chat request failed")?;
        if let ChatAnswer::ServiceError(error) = &answer {
            writer.write(&error.text());
        }
        writer.write("\n");
        writer.finish().context("failed to write answer to stdout")?;
    } else {
        let answer = session
            .ask(&prompt, None, Some(cancellation))
            .await
            .context("chat request failed")?;
        println!("{answer}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_macro(
    macro_file: &Path,
    code_file: &Path,
    language: Option<&str>,
    settings: &Settings,
    cancellation: &CancellationSignal,
) -> Result<ExitCode> {
    if !macro_file.exists() {
        println!("{MISSING_MACRO_MESSAGE}");
        return Ok(ExitCode::FAILURE);
    }
    let instructions = fs::read_to_string(macro_file)
        .with_context(|| format!("failed to read macro {}", macro_file.display()))?;
    let code = fs::read_to_string(code_file)
        .with_context(|| format!("failed to read code file {}", code_file.display()))?;
    let request = MacroRequest::new(&instructions, &code, language);

    let mut session = build_session(settings)?;
    for message in request.history {
        session.add_message(message.content, message.role);
    }
    session
        .ensure_ready(Some(cancellation))
        .await
        .context("authentication failed")?;

    let answer = session
        .ask(&request.prompt, Some(&request.attachment), Some(cancellation))
        .await
        .context("macro request failed")?;
    let text = answer.text();
    let code = first_code_block(&text);
    if code.is_empty() {
        warn!("answer contained no fenced code block");
    }
    for line in code {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn authenticator(settings: &Settings) -> Result<DeviceCodeAuthenticator> {
    let api = GithubDeviceFlow::new(AuthEndpoints::default(), Some(settings.timeout))
        .context("failed to initialize GitHub login client")?;
    let store = FileTokenStore::new(&settings.token_cache);
    Ok(DeviceCodeAuthenticator::new(Arc::new(api), Arc::new(store)))
}

/// Wire the production login, exchange and chat transport into a session.
pub fn build_session(settings: &Settings) -> Result<Session> {
    let identity = authenticator(settings)?;
    let exchanger = CopilotTokenExchange::new(&AuthEndpoints::default(), Some(settings.timeout))
        .context("failed to initialize token exchange client")?;
    let client = CopilotApiClient::new(CopilotApiConfig::new().with_timeout(settings.timeout))
        .context("failed to initialize chat client")?;
    debug!(session_id = %client.session_id(), "created chat session");

    Ok(Session::new(Arc::new(identity), Arc::new(exchanger), Arc::new(client))
        .with_instructions(settings.instructions.clone()))
}

/// Copies streamed fragments to `out` until the first write failure.
struct FragmentWriter<W: Write> {
    out: W,
    failed: Option<io::Error>,
}

impl<W: Write> FragmentWriter<W> {
    fn new(out: W) -> Self {
        Self { out, failed: None }
    }

    fn write(&mut self, fragment: &str) {
        if self.failed.is_some() {
            return;
        }
        let written = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(error) = written {
            warn!(%error, "answer output closed, discarding remaining fragments");
            self.failed = Some(error);
        }
    }

    fn finish(self) -> io::Result<()> {
        match self.failed {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// First Ctrl-C raises the returned signal; a second one exits immediately.
fn install_interrupt_handler() -> Result<CancellationSignal> {
    let signal = new_signal();
    flag::register_conditional_shutdown(SIGINT, i32::from(INTERRUPTED_EXIT_CODE), Arc::clone(&signal))
        .context("failed to install interrupt handler")?;
    flag::register(SIGINT, Arc::clone(&signal)).context("failed to install interrupt handler")?;
    Ok(signal)
}
