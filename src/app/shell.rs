// Console shell - line commands and event rendering for the ppewatch binary

use crate::state::{SessionSnapshot, StateChange};
use camino::Utf8PathBuf;
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  open <path>              select an image (replaces the current one)
  detect                   run PPE detection on the selected image
  ask <question>           ask the assistant about recorded violations
  export [dir]             download the violations report as CSV
  login <email> <password> sign in with credentials
  face <path>              sign in with a captured face image
  status                   show the session state and transcript
  ping                     check that the backend is reachable
  help                     show this help
  quit                     release resources and exit";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(Utf8PathBuf),
    Detect,
    Ask(String),
    Export(Option<Utf8PathBuf>),
    Login { email: String, password: String },
    Face(Utf8PathBuf),
    Status,
    Ping,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty input")]
    Empty,

    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "open" | "o" => required_path(rest, "open <path>").map(Command::Open),
            "detect" | "d" => Ok(Command::Detect),
            "ask" | "a" => {
                if rest.is_empty() {
                    Err(CommandError::Usage("ask <question>"))
                } else {
                    Ok(Command::Ask(rest.to_string()))
                }
            }
            "export" | "e" => Ok(Command::Export(
                (!rest.is_empty()).then(|| Utf8PathBuf::from(rest)),
            )),
            "login" => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(email), Some(password), None) => Ok(Command::Login {
                        email: email.to_string(),
                        password: password.to_string(),
                    }),
                    _ => Err(CommandError::Usage("login <email> <password>")),
                }
            }
            "face" => required_path(rest, "face <path>").map(Command::Face),
            "status" | "s" => Ok(Command::Status),
            "ping" => Ok(Command::Ping),
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

fn required_path(rest: &str, usage: &'static str) -> Result<Utf8PathBuf, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(Utf8PathBuf::from(rest))
    }
}

/// One-line description of a change event, or `None` for events the console
/// shows through other means
pub fn describe_change(change: &StateChange) -> Option<String> {
    let line = match change {
        StateChange::PreviewChanged {
            generation,
            preview,
        } => format!("[gen {}] preview ready ({})", generation, preview),
        StateChange::DetectionStarted { generation } => {
            format!("[gen {}] detecting...", generation)
        }
        StateChange::DetectionApplied { generation, output } => {
            format!("[gen {}] detection complete ({})", generation, output)
        }
        StateChange::DetectionFailed {
            generation,
            message,
        } => format!("[gen {}] {}", generation, message),
        StateChange::DetectionDiscarded {
            generation,
            current,
        } => format!(
            "[gen {}] result discarded, session is at gen {}",
            generation, current
        ),
        StateChange::TranscriptAppended { .. } => return None,
        StateChange::SignedIn { user: Some(user) } => format!("Welcome, {}", user),
        StateChange::SignedIn { user: None } => "Signed out".to_string(),
        StateChange::SessionClosed => "Session closed".to_string(),
    };
    Some(line)
}

/// Multi-line status report for the `status` command
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Detection: {} (gen {})",
        snapshot.status, snapshot.generation
    );
    if let Some(name) = &snapshot.input_name {
        let _ = writeln!(out, "  input:   {}", name);
    }
    if let Some(url) = &snapshot.preview_url {
        let _ = writeln!(out, "  preview: {}", url);
    }
    if let Some(url) = &snapshot.output_url {
        let _ = writeln!(out, "  output:  {}", url);
    }
    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "  error:   {}", error);
    }
    if let Some(user) = &snapshot.signed_in_user {
        let _ = writeln!(out, "Signed in as {}", user);
    }

    let _ = writeln!(
        out,
        "Conversation: {} entries, {} awaiting answer",
        snapshot.transcript.len(),
        snapshot.pending_questions
    );
    for entry in snapshot.transcript.iter() {
        let _ = writeln!(out, "  {:>3} {:<4} {}", entry.sequence, entry.sender, entry.text);
    }

    out
}
