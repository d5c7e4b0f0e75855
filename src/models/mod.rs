//! Data models for the ppewatch client.
//!
//! - [`MediaPayload`] / [`DetectionStatus`]: the image under analysis and where its session stands
//! - [`ConversationEntry`] / [`Transcript`]: the chat panel's ordered log
//! - [`AppConfig`]: settings loaded by [`ConfigManager`](crate::config::ConfigManager)
//!
//! Mutable session state does not live here; see [`crate::session`] and
//! [`StateManager`](crate::state::StateManager).

pub mod config;
pub mod conversation;
pub mod media;

pub use config::{ApiSettings, AppConfig, LoggingSettings, SessionSettings};
pub use conversation::{ConversationEntry, Sender, Transcript};
pub use media::{DetectionStatus, MediaPayload};
