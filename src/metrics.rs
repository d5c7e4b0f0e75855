// Session metrics module
//
// Lightweight counters for what happened during a session: detections,
// chat round trips, and state change broadcasts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session-wide counters
///
/// Uses atomic operations so spawned round-trip tasks can record outcomes
/// without taking the state lock. Logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Detect calls issued
    pub detections_started: AtomicU64,

    /// Detection results installed as the current output
    pub detections_applied: AtomicU64,

    /// Detection calls that failed for the current generation
    pub detections_failed: AtomicU64,

    /// Results dropped because a newer selection superseded them
    pub detections_discarded: AtomicU64,

    /// Total time spent waiting on the detection service in milliseconds
    pub total_detection_time_ms: AtomicU64,

    /// Chat questions submitted
    pub questions_submitted: AtomicU64,

    /// Chat round trips that produced an answer
    pub answers_received: AtomicU64,

    /// Chat round trips that ended in the error entry
    pub answer_errors: AtomicU64,

    /// Number of state change events broadcast
    pub state_broadcasts: AtomicU64,

    /// Broadcasts that found no listener
    pub state_broadcast_errors: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            detections_started: AtomicU64::new(0),
            detections_applied: AtomicU64::new(0),
            detections_failed: AtomicU64::new(0),
            detections_discarded: AtomicU64::new(0),
            total_detection_time_ms: AtomicU64::new(0),
            questions_submitted: AtomicU64::new(0),
            answers_received: AtomicU64::new(0),
            answer_errors: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcast_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_detection_started(&self) {
        self.detections_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_applied(&self) {
        self.detections_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_failed(&self) {
        self.detections_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_discarded(&self) {
        self.detections_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one detection round trip took
    pub fn record_detection_time(&self, duration: Duration) {
        self.total_detection_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_question(&self) {
        self.questions_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_answer(&self) {
        self.answers_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_answer_error(&self) {
        self.answer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast_error(&self) {
        self.state_broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average detection round trip in milliseconds, over completed calls
    pub fn avg_detection_time_ms(&self) -> f64 {
        let total = self.total_detection_time_ms.load(Ordering::Relaxed);
        let count = self.detections_applied.load(Ordering::Relaxed)
            + self.detections_failed.load(Ordering::Relaxed)
            + self.detections_discarded.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Detections: {} started, {} applied, {} failed, {} discarded (avg {:.2}ms)",
            self.detections_started.load(Ordering::Relaxed),
            self.detections_applied.load(Ordering::Relaxed),
            self.detections_failed.load(Ordering::Relaxed),
            self.detections_discarded.load(Ordering::Relaxed),
            self.avg_detection_time_ms()
        );
        tracing::info!(
            "Chat: {} questions, {} answers, {} errors",
            self.questions_submitted.load(Ordering::Relaxed),
            self.answers_received.load(Ordering::Relaxed),
            self.answer_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "State broadcasts: {}, without listeners: {}",
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcast_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
