// State management module
//
// This module provides the StateManager which wraps the session controllers
// with shared, lock-guarded access and emits change events after every mutation.

use crate::metrics::Metrics;
use crate::models::{DetectionStatus, MediaPayload, Sender, Transcript};
use crate::resources::HandleId;
use crate::services::ServiceError;
use crate::session::{
    ChatTicket, ConversationController, DetectError, DetectOutcome, DetectTicket,
    DetectionSessionController,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything the client session owns.
///
/// Only reachable through [`StateManager`]; the controllers inside are the sole
/// mutators of their own data.
#[derive(Debug, Default)]
pub struct AppState {
    pub detection: DetectionSessionController,
    pub conversation: ConversationController,
    pub signed_in_user: Option<String>,
}

/// Change events emitted when state is modified
///
/// These events let renderers react without polling the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A new file was selected and its preview installed
    PreviewChanged {
        generation: u64,
        preview: HandleId,
    },

    /// A detect call was issued
    DetectionStarted {
        generation: u64,
    },

    /// A detection result became the current output
    DetectionApplied {
        generation: u64,
        output: HandleId,
    },

    /// The detect call for the current generation failed
    DetectionFailed {
        generation: u64,
        message: String,
    },

    /// A stale detection result arrived and was dropped
    DetectionDiscarded {
        generation: u64,
        current: u64,
    },

    /// An entry was placed in the transcript
    TranscriptAppended {
        sequence: u64,
        sender: Sender,
    },

    /// A user signed in, or signed out (`None`)
    SignedIn {
        user: Option<String>,
    },

    /// The media session was torn down
    SessionClosed,
}

/// Read-only copy of what a renderer needs
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub status: DetectionStatus,
    pub generation: u64,
    pub input_name: Option<String>,
    pub preview_url: Option<String>,
    pub output_url: Option<String>,
    pub last_error: Option<String>,
    pub transcript: Transcript,
    pub pending_questions: usize,
    pub signed_in_user: Option<String>,
}

/// The parts of [`AppState`] compared before and after an update
#[derive(Clone, Debug, PartialEq)]
struct Fingerprint {
    generation: u64,
    status: DetectionStatus,
    preview: Option<HandleId>,
    output: Option<HandleId>,
    sequences: Vec<u64>,
    user: Option<String>,
}

impl Fingerprint {
    fn of(state: &AppState) -> Self {
        Self {
            generation: state.detection.generation(),
            status: state.detection.status(),
            preview: state.detection.preview().map(|h| h.id()),
            output: state.detection.output().map(|h| h.id()),
            sequences: state
                .conversation
                .transcript()
                .iter()
                .map(|entry| entry.sequence)
                .collect(),
            user: state.signed_in_user.clone(),
        }
    }
}

/// Thread-safe state manager with event emission
///
/// This is the central state component that:
/// - Provides shared access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Every mutation runs to completion under the write lock, so a state
/// transition is atomic with respect to the spawned round-trip tasks.
///
/// # Related Types
///
/// - [`crate::session::DetectionSessionController`]: media session state machine
/// - [`crate::session::ConversationController`]: transcript and pending questions
/// - [`crate::app::AppController`]: issues the service calls and feeds results back
pub struct StateManager {
    /// The session state protected by RwLock
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    metrics: Arc<Metrics>,
}

impl StateManager {
    /// Create a new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let detecting = state_manager.read(|state| state.detection.is_detecting());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read();
        f(&state)
    }

    /// Get a renderable copy of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(|state| SessionSnapshot {
            status: state.detection.status(),
            generation: state.detection.generation(),
            input_name: state.detection.input().map(|p| p.file_name.clone()),
            preview_url: state.detection.preview().map(|h| h.url().to_string()),
            output_url: state.detection.output().map(|h| h.url().to_string()),
            last_error: state.detection.last_error().map(str::to_string),
            transcript: state.conversation.transcript().clone(),
            pending_questions: state.conversation.pending_count(),
            signed_in_user: state.signed_in_user.clone(),
        })
    }

    /// Update the state and emit change events
    ///
    /// 1. Fingerprints the old state
    /// 2. Applies the update function
    /// 3. Diffs the fingerprints
    /// 4. Emits the resulting events
    ///
    /// # Returns
    /// The closure's result and the events that were emitted
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write();
        let before = Fingerprint::of(&state);

        let result = update_fn(&mut state);

        let after = Fingerprint::of(&state);
        let changes = Self::detect_changes(&before, &after, &state);

        for change in &changes {
            self.emit(change.clone());
        }

        (result, changes)
    }

    /// Update the state and emit change events
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update_with(update_fn).1
    }

    /// Subscribe to state change events
    ///
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    fn emit(&self, change: StateChange) {
        // It's OK if no one is listening
        if self.state_tx.send(change).is_ok() {
            self.metrics.record_state_broadcast();
        } else {
            self.metrics.record_state_broadcast_error();
        }
    }

    /// Detect what changed between two fingerprints and generate events
    fn detect_changes(old: &Fingerprint, new: &Fingerprint, state: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.generation != new.generation
            && new.status == DetectionStatus::Idle
            && new.preview.is_none()
        {
            changes.push(StateChange::SessionClosed);
        } else if let Some(preview) = new.preview.filter(|_| new.preview != old.preview) {
            changes.push(StateChange::PreviewChanged {
                generation: new.generation,
                preview,
            });
        }

        if old.status != new.status || old.output != new.output {
            match new.status {
                DetectionStatus::Detecting => changes.push(StateChange::DetectionStarted {
                    generation: new.generation,
                }),
                DetectionStatus::Failed => changes.push(StateChange::DetectionFailed {
                    generation: new.generation,
                    message: state
                        .detection
                        .last_error()
                        .unwrap_or_default()
                        .to_string(),
                }),
                DetectionStatus::Detected => {
                    if let Some(output) = new.output {
                        changes.push(StateChange::DetectionApplied {
                            generation: new.generation,
                            output,
                        });
                    }
                }
                DetectionStatus::Idle | DetectionStatus::Previewing => {}
            }
        }

        if old.sequences != new.sequences {
            let transcript = state.conversation.transcript();
            for sequence in &new.sequences {
                if old.sequences.binary_search(sequence).is_err() {
                    if let Some(entry) = transcript.get(*sequence) {
                        changes.push(StateChange::TranscriptAppended {
                            sequence: entry.sequence,
                            sender: entry.sender,
                        });
                    }
                }
            }
        }

        if old.user != new.user {
            changes.push(StateChange::SignedIn {
                user: new.user.clone(),
            });
        }

        changes
    }

    // Convenience methods for the session transitions

    /// Install a newly selected file. Returns the new generation.
    pub fn select_file(&self, payload: MediaPayload) -> u64 {
        self.update_with(|state| state.detection.select_file(payload))
            .0
    }

    /// Accept a detect request, or reject it without any state change
    pub fn begin_detect(&self) -> Result<DetectTicket, DetectError> {
        let (ticket, _) = self.update_with(|state| state.detection.begin_detect());
        if ticket.is_ok() {
            self.metrics.record_detection_started();
        }
        ticket
    }

    /// Deliver a detection result for `generation`
    pub fn complete_detect(
        &self,
        generation: u64,
        result: Result<Vec<u8>, ServiceError>,
    ) -> DetectOutcome {
        let (outcome, _) =
            self.update_with(|state| state.detection.complete_detect(generation, result));

        match &outcome {
            DetectOutcome::Applied { .. } => self.metrics.record_detection_applied(),
            DetectOutcome::Failed { .. } => self.metrics.record_detection_failed(),
            DetectOutcome::Discarded {
                generation,
                current,
            } => {
                self.metrics.record_detection_discarded();
                // Not visible in the state diff, so emitted explicitly
                self.emit(StateChange::DetectionDiscarded {
                    generation: *generation,
                    current: *current,
                });
            }
        }

        outcome
    }

    /// Record a chat question; `None` if the text is blank
    pub fn submit_message(&self, text: &str) -> Option<ChatTicket> {
        let (ticket, _) = self.update_with(|state| state.conversation.submit(text));
        if ticket.is_some() {
            self.metrics.record_question();
        }
        ticket
    }

    /// Record the answer or failure for question `sequence`
    pub fn complete_message(&self, sequence: u64, result: Result<String, ServiceError>) -> bool {
        let failed = result.is_err();
        let (recorded, _) = self.update_with(|state| {
            state.conversation.complete(sequence, result).is_some()
        });

        if recorded {
            if failed {
                self.metrics.record_answer_error();
            } else {
                self.metrics.record_answer();
            }
        }
        recorded
    }

    pub fn set_signed_in_user(&self, user: Option<String>) -> Vec<StateChange> {
        self.update(|state| state.signed_in_user = user)
    }

    /// Tear down the media session, releasing its display resources
    pub fn close_session(&self) -> usize {
        self.update_with(|state| state.detection.teardown()).0
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn image(name: &str) -> MediaPayload {
        MediaPayload::new(name, vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let snapshot = manager.snapshot();

        assert_eq!(snapshot.status, DetectionStatus::Idle);
        assert!(snapshot.preview_url.is_none());
        assert!(snapshot.transcript.is_empty());
        assert!(snapshot.signed_in_user.is_none());
    }

    #[test]
    fn test_select_file_emits_preview_changed() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        let generation = manager.select_file(image("a.jpg"));

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            StateChange::PreviewChanged { generation: g, .. } if g == generation
        ));
        assert_eq!(manager.snapshot().input_name.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_detect_lifecycle_events() {
        let manager = StateManager::new();
        manager.select_file(image("a.jpg"));
        let mut rx = manager.subscribe();

        let ticket = manager.begin_detect().unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::DetectionStarted { .. }
        ));

        manager.complete_detect(ticket.generation, Ok(vec![1, 2]));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::DetectionApplied { .. }
        ));
        assert!(manager.snapshot().output_url.is_some());
    }

    #[test]
    fn test_rejected_detect_emits_nothing() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        assert_eq!(manager.begin_detect(), Err(DetectError::NoInput));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            manager.metrics().detections_started.load(Ordering::Relaxed),
            0
        );
    }

    #[test]
    fn test_discarded_result_is_announced() {
        let manager = StateManager::new();
        manager.select_file(image("f1.jpg"));
        let stale = manager.begin_detect().unwrap();
        manager.select_file(image("f2.jpg"));
        let mut rx = manager.subscribe();

        let outcome = manager.complete_detect(stale.generation, Ok(vec![9]));

        assert!(matches!(outcome, DetectOutcome::Discarded { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::DetectionDiscarded { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_detection_event_carries_message() {
        let manager = StateManager::new();
        manager.select_file(image("a.jpg"));
        let ticket = manager.begin_detect().unwrap();
        let mut rx = manager.subscribe();

        manager.complete_detect(ticket.generation, Err(ServiceError::Timeout));

        match rx.try_recv().unwrap() {
            StateChange::DetectionFailed { message, .. } => {
                assert_eq!(message, crate::session::DETECTION_FAILED_MESSAGE);
            }
            other => panic!("Expected DetectionFailed, got: {:?}", other),
        }
    }

    #[test]
    fn test_transcript_events_follow_sequence() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        let ticket = manager.submit_message("count violations").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::TranscriptAppended {
                sequence: 1,
                sender: Sender::User
            }
        );

        assert!(manager.complete_message(ticket.sequence, Ok("3".into())));
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::TranscriptAppended {
                sequence: 2,
                sender: Sender::Bot
            }
        );
    }

    #[test]
    fn test_blank_message_changes_nothing() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        assert!(manager.submit_message("  ").is_none());
        assert!(rx.try_recv().is_err());
        assert!(manager.snapshot().transcript.is_empty());
    }

    #[test]
    fn test_close_session_emits_closed() {
        let manager = StateManager::new();
        manager.select_file(image("a.jpg"));
        let mut rx = manager.subscribe();

        assert_eq!(manager.close_session(), 1);
        assert_eq!(rx.try_recv().unwrap(), StateChange::SessionClosed);
        assert!(manager.read(|s| s.detection.resources().live_count() == 0));
    }

    #[test]
    fn test_sign_in_event() {
        let manager = StateManager::new();
        let changes = manager.set_signed_in_user(Some("ravi".into()));

        assert_eq!(
            changes,
            vec![StateChange::SignedIn {
                user: Some("ravi".into())
            }]
        );
    }

    #[test]
    fn test_clone_shares_state() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.select_file(image("a.jpg"));

        assert_eq!(manager2.snapshot().status, DetectionStatus::Previewing);
    }
}
