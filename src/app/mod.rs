//! Application layer - wires user intents to the session state and the backend.
//!
//! - [`AppController`]: issues service calls on the tokio runtime and feeds
//!   results back through the [`crate::state::StateManager`]
//! - [`shell`]: line commands and event rendering for the console binary

pub mod controller;
pub mod shell;

pub use controller::{AppController, Services, load_payload};
pub use shell::{Command, CommandError};
