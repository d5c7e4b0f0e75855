//! Session controllers.
//!
//! Both controllers are synchronous: every method is a single atomic step, and
//! the only suspension points live outside them, in the service calls that
//! [`AppController`](crate::app::AppController) spawns. A call is started from a
//! ticket ([`DetectTicket`], [`ChatTicket`]) and its result is fed back through
//! `complete_*`, which decides whether the result still applies.

pub mod conversation;
pub mod detection;

pub use conversation::{CONNECTION_ERROR_MESSAGE, ChatTicket, ConversationController};
pub use detection::{
    DETECTION_FAILED_MESSAGE, DetectError, DetectOutcome, DetectTicket, DetectionSessionController,
};
