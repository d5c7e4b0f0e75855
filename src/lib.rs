// ppewatch - client session core for PPE compliance detection
//
// This is the library crate containing the session logic: display resource
// lifecycle, the detection session state machine, the ordered conversation
// transcript, and the services they talk to.
// The binary crate (main.rs) provides the console entry point.

pub mod app;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod resources;
pub mod services;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use app::{AppController, Services};
pub use config::ConfigManager;
pub use models::{AppConfig, ConversationEntry, DetectionStatus, MediaPayload, Sender, Transcript};
pub use resources::{ResourceHandle, ResourceLifecycleManager, Slot};
pub use session::{ConversationController, DetectError, DetectOutcome, DetectionSessionController};
pub use state::{SessionSnapshot, StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
