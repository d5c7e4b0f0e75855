//! ppewatch - PPE compliance detection client
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary drives the session core from a line-oriented console. It initializes:
//! - Configuration loading ([`ConfigManager`]: defaults, `ppewatch.yaml`, `PPEWATCH__*`)
//! - Logging infrastructure (file rotation + stderr output)
//! - Tokio async runtime (4 worker threads for service round trips)
//! - State management ([`StateManager`])
//! - App controller ([`AppController`] - issues service calls, feeds results back)
//!
//! The application uses a simple threading model:
//! - **Runtime thread**: reads stdin lines and dispatches commands
//! - **Tokio workers**: detection, chat, export and login round trips
//! - **Event printer**: a task that renders [`StateChange`] events as they arrive
//!
//! # Execution Flow
//!
//! 1. Load configuration
//! 2. Initialize logging → logs/ppewatch.<date>
//! 3. Create tokio runtime with 4 worker threads
//! 4. Create StateManager, ApiClient and AppController
//! 5. Run the command loop until `quit` or end of input
//! 6. Release display resources, log metrics
//! 7. Shutdown tokio runtime with 5s timeout

use anyhow::Result;
use ppewatch::app::shell::{self, Command, CommandError};
use ppewatch::app::load_payload;
use ppewatch::services::{ApiClient, AuthOutcome};
use ppewatch::{APP_NAME, AppController, ConfigManager, Services, StateChange, StateManager, VERSION};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let config = ConfigManager::new(".")?.load()?;

    let _log_guard = ppewatch::logging::setup_logging(&config.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("ppewatch-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    let state_manager = Arc::new(StateManager::new());
    let client = ApiClient::new(&config.api)?;
    tracing::info!("Backend at {}", client.base_url());

    let controller = AppController::new(
        state_manager.clone(),
        Services::from_client(client.clone()),
        config.session.clone(),
        runtime.handle().clone(),
    );

    let result = runtime.block_on(run_console(&controller, &client));

    tracing::info!("Console closed, shutting down");
    let released = controller.shutdown();
    tracing::info!("Released {} display resource(s)", released);

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    result
}

async fn run_console(controller: &AppController, client: &ApiClient) -> Result<()> {
    let printer = tokio::spawn(print_events(controller.state().clone()));

    println!("{} v{} - type 'help' for commands", APP_NAME, VERSION);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        if let Err(e) = dispatch(controller, client, command).await {
            tracing::error!("{:#}", e);
            println!("Error: {:#}", e);
        }
    }

    printer.abort();
    Ok(())
}

async fn dispatch(controller: &AppController, client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Open(path) => {
            controller.open_file(&path).await?;
        }
        Command::Detect => {
            // The outcome is reported through the event stream
            if let Err(e) = controller.request_detect() {
                println!("{}", e);
            }
        }
        Command::Ask(question) => {
            let _ = controller.submit_message(&question);
        }
        Command::Export(dir) => {
            let path = controller.export_report(dir.as_deref()).await?;
            println!("Saved {}", path);
        }
        Command::Login { email, password } => {
            let outcome = controller.login(&email, &password).await?;
            print_auth(&outcome);
        }
        Command::Face(path) => {
            let frame = load_payload(&path).await?;
            let outcome = controller.face_login(frame).await?;
            print_auth(&outcome);
        }
        Command::Status => {
            print!("{}", shell::render_status(&controller.state().snapshot()));
        }
        Command::Ping => {
            let message = client.health().await?;
            println!("{}", message);
        }
        Command::Help => println!("{}", shell::HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_auth(outcome: &AuthOutcome) {
    if let AuthOutcome::Rejected { message } = outcome {
        println!("Login failed: {}", message);
    }
}

async fn print_events(state: Arc<StateManager>) {
    let mut events = state.subscribe();
    loop {
        match events.recv().await {
            Ok(StateChange::TranscriptAppended { sequence, sender }) => {
                let text = state.read(|s| {
                    s.conversation
                        .transcript()
                        .get(sequence)
                        .map(|entry| entry.text.clone())
                });
                if let Some(text) = text {
                    println!("{}: {}", sender, text);
                }
            }
            Ok(change) => {
                if let Some(line) = shell::describe_change(&change) {
                    println!("{}", line);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event printer lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
