use crate::models::{DetectionStatus, MediaPayload};
use crate::resources::{HandleId, ResourceHandle, ResourceLifecycleManager, Slot};
use crate::services::ServiceError;
use thiserror::Error;

/// Shown when a detection round trip fails.
pub const DETECTION_FAILED_MESSAGE: &str = "Detection failed. Check backend logs.";

/// Synchronous rejections of a detect request. No state changes when these occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("Please upload an image before detecting!")]
    NoInput,

    #[error("Detection already in progress for the current image")]
    AlreadyInFlight,
}

/// A detect request that has been accepted and must now be sent to the service.
///
/// The generation is captured at acceptance; the eventual result is handed back
/// to [`DetectionSessionController::complete_detect`] together with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectTicket {
    pub generation: u64,
    pub payload: MediaPayload,
}

/// What happened to a detection result when it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
    /// Result installed in the output slot
    Applied { generation: u64, output: HandleId },
    /// Service failed while this generation was still current
    Failed { generation: u64, message: String },
    /// Result belonged to a superseded generation and was dropped untouched
    Discarded { generation: u64, current: u64 },
}

/// State machine for one upload/detect cycle (the media session).
///
/// Owns the selected input, the preview and output display resources, and the
/// generation counter. Every new selection bumps the generation, and a
/// detection result is only applied if the generation it was issued under is
/// still current. At most one detect call may be in flight per generation.
#[derive(Debug, Default)]
pub struct DetectionSessionController {
    input: Option<MediaPayload>,
    status: DetectionStatus,
    generation: u64,
    in_flight: Option<u64>,
    last_error: Option<String>,
    resources: ResourceLifecycleManager,
}

impl DetectionSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a newly chosen file as the session input.
    ///
    /// Replaces the preview, revokes any previous detection output and starts a
    /// new generation, which invalidates whatever call is still in flight.
    pub fn select_file(&mut self, payload: MediaPayload) -> u64 {
        self.generation += 1;

        let preview = self.resources.replace(Slot::Preview, payload.bytes.clone()).id();
        if self.resources.clear(Slot::Output) {
            tracing::debug!("Cleared previous detection output on new selection");
        }

        if let Some(stale) = self.in_flight.take() {
            tracing::debug!(
                "Generation {} superseded while detection was in flight",
                stale
            );
        }

        tracing::info!(
            "Selected {} ({} bytes), generation {}, preview {}",
            payload.file_name,
            payload.len(),
            self.generation,
            preview
        );

        self.input = Some(payload);
        self.status = DetectionStatus::Previewing;
        self.last_error = None;

        self.generation
    }

    /// Accept a detect request for the current input.
    ///
    /// # Errors
    /// - [`DetectError::NoInput`] if nothing has been selected
    /// - [`DetectError::AlreadyInFlight`] if this generation already has a call outstanding
    pub fn begin_detect(&mut self) -> Result<DetectTicket, DetectError> {
        let Some(input) = self.input.as_ref() else {
            tracing::warn!("Detect requested with no image selected");
            return Err(DetectError::NoInput);
        };

        if self.in_flight == Some(self.generation) || !self.status.accepts_detect() {
            tracing::warn!(
                "Detect requested while generation {} is already detecting",
                self.generation
            );
            return Err(DetectError::AlreadyInFlight);
        }

        let ticket = DetectTicket {
            generation: self.generation,
            payload: input.clone(),
        };

        self.in_flight = Some(self.generation);
        self.status = DetectionStatus::Detecting;
        self.last_error = None;

        tracing::info!(
            "Detection started for {} (generation {})",
            ticket.payload.file_name,
            ticket.generation
        );

        Ok(ticket)
    }

    /// Deliver the result of a detect call issued under `generation`.
    pub fn complete_detect(
        &mut self,
        generation: u64,
        result: Result<Vec<u8>, ServiceError>,
    ) -> DetectOutcome {
        if generation != self.generation || self.in_flight != Some(generation) {
            tracing::debug!(
                "Discarding detection result for generation {} (current {})",
                generation,
                self.generation
            );
            return DetectOutcome::Discarded {
                generation,
                current: self.generation,
            };
        }

        self.in_flight = None;

        match result {
            Ok(annotated) => {
                let output = self.resources.replace(Slot::Output, annotated).id();
                self.status = DetectionStatus::Detected;
                tracing::info!(
                    "Detection applied for generation {}, output {}",
                    generation,
                    output
                );
                DetectOutcome::Applied { generation, output }
            }
            Err(e) => {
                tracing::warn!("Detection failed for generation {}: {}", generation, e);
                self.status = DetectionStatus::Failed;
                self.last_error = Some(DETECTION_FAILED_MESSAGE.to_string());
                DetectOutcome::Failed {
                    generation,
                    message: DETECTION_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }

    /// End the session: revoke both display resources and invalidate in-flight calls.
    pub fn teardown(&mut self) -> usize {
        let released = self.resources.release_all();
        self.generation += 1;
        self.in_flight = None;
        self.input = None;
        self.status = DetectionStatus::Idle;
        self.last_error = None;

        tracing::info!("Media session closed, released {} resource(s)", released);
        released
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn input(&self) -> Option<&MediaPayload> {
        self.input.as_ref()
    }

    pub fn is_detecting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn preview(&self) -> Option<&ResourceHandle> {
        self.resources.current(Slot::Preview)
    }

    pub fn output(&self) -> Option<&ResourceHandle> {
        self.resources.current(Slot::Output)
    }

    pub fn resources(&self) -> &ResourceLifecycleManager {
        &self.resources
    }
}
