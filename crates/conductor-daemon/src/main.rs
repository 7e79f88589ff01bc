//! Conductor daemon - drives one worker session from the terminal.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use conductor_core::credentials::{
    default_models, CredentialStore, MemoryCredentialStore, ModelOption,
};
use conductor_core::events::{EventContext, LogVersion};
use conductor_core::onboarding::{load_saved_setup, OnboardingForm};
use conductor_core::{
    AgentConfig, ControllerConfig, HttpBackend, SessionController, SessionEvent, SessionId,
    SessionSnapshot, SessionState, SetupPhase,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use commands::{rejection_hint, Command, HELP};

#[derive(Parser, Debug)]
#[command(name = "conductor-daemon")]
#[command(about = "Drive an agent worker session from the terminal")]
struct Args {
    /// Base URL of the worker's HTTP server
    #[arg(long, env = "CONDUCTOR_URL", default_value = "http://127.0.0.1:10001")]
    url: String,

    /// Worker-side session name
    #[arg(long, default_value = "UI")]
    session: String,

    /// Project directory (default: current directory)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Model to run (default: first known model)
    #[arg(long, env = "CONDUCTOR_MODEL")]
    model: Option<String>,

    /// API key for the model
    #[arg(long, env = "CONDUCTOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory for the session transition log
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Pause between failed health probes
    #[arg(long, default_value_t = 1000)]
    healthcheck_interval_ms: u64,

    /// Pause between event polls
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,
}

/// Changes forwarded from subscriber callbacks to the main loop.
enum Update {
    State(SessionState),
    /// The transcript grew or was replaced.
    Log,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = MemoryCredentialStore::new();
    let create = onboard(&args, &store)?;
    let agent_config = load_saved_setup(&store)?.context("Credentials were not saved")?;

    let backend = Arc::new(HttpBackend::new(
        args.url.clone(),
        SessionId(args.session.clone()),
    ));
    let config = ControllerConfig::new()
        .healthcheck_interval(Duration::from_millis(args.healthcheck_interval_ms))
        .event_poll_interval(Duration::from_millis(args.poll_interval_ms))
        .log_id(args.session.clone());
    let mut builder = SessionController::builder(backend)
        .config(config)
        .on_fatal_notice(|notice| eprintln!("\n{}\n\nType /reset to try again.\n", notice));
    if let Some(dir) = &args.log_dir {
        builder = builder.log_dir(dir);
    }
    let controller = builder.build()?;

    log::info!("Connecting to worker at {} (session {})", args.url, args.session);

    let (updates, mut rx) = mpsc::unbounded_channel();
    let state_updates = updates.clone();
    controller.select(
        |s: &SessionSnapshot| s.state(),
        move |state| {
            let _ = state_updates.send(Update::State(*state));
        },
    );
    controller.select(
        |s: &SessionSnapshot| s.context().server_event_context().version(),
        move |_: &LogVersion| {
            let _ = updates.send(Update::Log);
        },
    );

    let mut printer = TranscriptPrinter::default();
    // The state may have moved before the subscriptions were registered.
    on_state(&controller, controller.state(), &create, &agent_config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(update) = rx.recv() => match update {
                Update::State(state) => on_state(&controller, state, &create, &agent_config),
                Update::Log => printer.print_new(&controller.snapshot()),
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if !run_command(&controller, command) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    log::info!("Shutting down");
    Ok(())
}

/// Fill the onboarding form from flags and store the credentials.
fn onboard(args: &Args, store: &dyn CredentialStore) -> Result<SessionEvent> {
    let catalog = default_models();
    let model = match &args.model {
        Some(name) => catalog
            .iter()
            .find(|m| &m.value == name)
            .cloned()
            .unwrap_or_else(|| ModelOption::new(name.clone(), "Custom", "")),
        None => catalog
            .first()
            .cloned()
            .context("No models available")?,
    };
    let key_url = model.api_key_url.clone();

    let path = match &args.path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };

    let mut form = OnboardingForm::new(store);
    form.select_model(model)?;
    form.set_api_key(args.api_key.clone().unwrap_or_default());
    form.set_folder_path(path.to_string_lossy());

    form.submit().with_context(|| {
        if key_url.is_empty() {
            "Cannot start a session; pass --api-key or set CONDUCTOR_API_KEY".to_string()
        } else {
            format!(
                "Cannot start a session; pass --api-key or set CONDUCTOR_API_KEY (get one at {})",
                key_url
            )
        }
    })
}

/// Drive setup forward and report state changes.
///
/// A failed create or init is not retried automatically; `/reset` starts over.
fn on_state(
    controller: &SessionController,
    state: SessionState,
    create: &SessionEvent,
    agent_config: &AgentConfig,
) {
    if state.is_setup() {
        if let Some(error) = controller.snapshot().context().last_error() {
            println!("-- setup stopped at {}: {}", state, error);
            println!("-- type /reset to try again");
            return;
        }
    }

    match state {
        SessionState::Setup(SetupPhase::Ready) => controller.send(create.clone()),
        SessionState::Setup(SetupPhase::Created) => {
            controller.send(SessionEvent::init(agent_config.clone()))
        }
        SessionState::Setup(phase) => log::debug!("Setup phase {:?}", phase),
        SessionState::Running => println!("-- running (type /help for commands)"),
        SessionState::Paused => println!("-- paused"),
        SessionState::Resetting => println!("-- resetting"),
        SessionState::Failed => println!("-- worker unreachable"),
    }
}

/// Returns false when the daemon should exit.
fn run_command(controller: &SessionController, command: Command) -> bool {
    match command {
        Command::Quit => return false,
        Command::Help => println!("{}", HELP),
        Command::Status => print_status(&controller.snapshot()),
        Command::Unknown(message) => println!("{} (type /help)", message),
        command => {
            let Some(event) = command.event() else {
                return true;
            };
            if !controller.can(&event) {
                println!("{}", rejection_hint(&event, controller.state()));
                return true;
            }
            controller.send(event);
            if let Command::Goto(index) = command {
                if let Some(position) = controller.snapshot().navigation_display_target() {
                    println!("-- navigating to message {} (row {})", index, position);
                }
            }
        }
    }
    true
}

fn print_status(snapshot: &SessionSnapshot) {
    let context = snapshot.context();
    let events = context.server_event_context();
    println!("state:     {}", snapshot.state());
    println!("attempt:   {}", snapshot.epoch());
    println!("retries:   {}", context.healthcheck_retry());
    println!("messages:  {}", events.log().len());
    println!("input:     {}", snapshot.chat_status().prompt());
    if let Some(config) = context.agent_config() {
        println!("model:     {}", config.model);
    }
    if let Some(path) = context.path() {
        println!("project:   {}", path);
    }
    if let Some(target) = snapshot.navigation_target() {
        println!("navigating to message {}", target.index);
    }
    if let Some(error) = context.last_error() {
        println!("error:     {}", error);
    }
}

/// Prints display messages that have not been printed yet.
#[derive(Default)]
struct TranscriptPrinter {
    generation: u64,
    next_index: usize,
}

impl TranscriptPrinter {
    fn print_new(&mut self, snapshot: &SessionSnapshot) {
        for line in self.new_lines(snapshot.context().server_event_context()) {
            println!("{}", line);
        }
    }

    /// Display lines added since the last call.
    ///
    /// A lone leading task is held back until the next message shows whether
    /// the display view keeps it.
    fn new_lines(&mut self, events: &EventContext) -> Vec<String> {
        if events.generation() != self.generation {
            self.generation = events.generation();
            self.next_index = 0;
        }
        let log = events.log();
        if log.is_display_provisional() {
            return Vec::new();
        }
        let lines = log
            .display()
            .iter()
            .filter(|message| message.index() >= self.next_index)
            .map(|message| format!("[{}] {}", message.kind(), message.text()))
            .collect();
        self.next_index = log.len();
        lines
    }
}
