// App Controller - turns user intents into session transitions and service calls
//
// This module contains the AppController which coordinates between:
// - StateManager (session state + change events)
// - The backend services (detection, chat, export, auth, report mail)
// - The tokio runtime the round trips run on
//
// Each intent is handled in two halves: a synchronous transition under the
// state lock (accept/reject, reserve, capture generation), then a spawned task
// that awaits the service and hands the result back to the StateManager.

use crate::models::{MediaPayload, SessionSettings};
use crate::services::{
    ApiClient, AuthOutcome, ConversationService, CredentialAuthService, DetectionService,
    ExportService, FaceAuthService, ReportMailService, ServiceError, save_report,
};
use crate::session::{DetectError, DetectOutcome};
use crate::state::StateManager;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinHandle};

/// The backend collaborators, one trait object per concern
#[derive(Clone)]
pub struct Services {
    pub detection: Arc<dyn DetectionService>,
    pub conversation: Arc<dyn ConversationService>,
    pub export: Arc<dyn ExportService>,
    pub face_auth: Arc<dyn FaceAuthService>,
    pub credentials: Arc<dyn CredentialAuthService>,
    pub mail: Arc<dyn ReportMailService>,
}

impl Services {
    /// Route every concern through the same HTTP client
    pub fn from_client(client: ApiClient) -> Self {
        let client = Arc::new(client);
        Self {
            detection: client.clone(),
            conversation: client.clone(),
            export: client.clone(),
            face_auth: client.clone(),
            credentials: client.clone(),
            mail: client,
        }
    }
}

/// Orchestrates the detection panel, the chat panel, export and login
///
/// # Example
/// ```ignore
/// let state = Arc::new(StateManager::new());
/// let services = Services::from_client(ApiClient::new(&config.api)?);
/// let controller = AppController::new(state, services, config.session, runtime.handle().clone());
///
/// controller.open_file("site.jpg".into()).await?;
/// let detection = controller.request_detect()?;   // rejected synchronously if no input
/// let chat = controller.submit_message("How many violations today?");
/// ```
pub struct AppController {
    state: Arc<StateManager>,
    services: Services,
    settings: SessionSettings,
    runtime: tokio::runtime::Handle,
}

impl AppController {
    pub fn new(
        state: Arc<StateManager>,
        services: Services,
        settings: SessionSettings,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        tracing::info!("App controller initialized");
        Self {
            state,
            services,
            settings,
            runtime,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    /// Read an image from disk and make it the session input
    ///
    /// # Returns
    /// The new generation
    pub async fn open_file(&self, path: &Utf8Path) -> Result<u64> {
        let payload = load_payload(path).await?;
        Ok(self.select_file(payload))
    }

    /// Make `payload` the session input, superseding any in-flight detection
    pub fn select_file(&self, payload: MediaPayload) -> u64 {
        self.state.select_file(payload)
    }

    /// Start a detection round trip for the current input
    ///
    /// The request is accepted or rejected synchronously. When accepted, the
    /// returned task resolves to what happened to the result once it arrived.
    /// After an applied result the report mail is sent in the background if
    /// `notify_on_detect` is enabled.
    pub fn request_detect(&self) -> Result<JoinHandle<DetectOutcome>, DetectError> {
        let ticket = self.state.begin_detect()?;

        let state = Arc::clone(&self.state);
        let detection = Arc::clone(&self.services.detection);
        let mail = self
            .settings
            .notify_on_detect
            .then(|| Arc::clone(&self.services.mail));

        Ok(self.runtime.spawn(async move {
            let started = Instant::now();
            let call = tokio::spawn(async move { detection.detect(ticket.payload).await });
            let result = settle(call.await, "detection");
            state.metrics().record_detection_time(started.elapsed());

            let outcome = state.complete_detect(ticket.generation, result);

            if let (DetectOutcome::Applied { .. }, Some(mail)) = (&outcome, mail) {
                tokio::spawn(async move {
                    match mail.send_report().await {
                        Ok(()) => tracing::info!("Violations report mailed"),
                        Err(e) => tracing::warn!("Failed to send violations report: {}", e),
                    }
                });
            }

            outcome
        }))
    }

    /// Record a chat question and ask the conversation service in the background
    ///
    /// Returns `None` for blank input (nothing recorded, no call issued).
    /// Otherwise the task resolves once the answer or error entry is recorded.
    pub fn submit_message(&self, text: &str) -> Option<JoinHandle<bool>> {
        let ticket = self.state.submit_message(text)?;

        let state = Arc::clone(&self.state);
        let conversation = Arc::clone(&self.services.conversation);

        Some(self.runtime.spawn(async move {
            let call = tokio::spawn(async move { conversation.ask(ticket.question).await });
            let result = settle(call.await, "conversation");
            state.complete_message(ticket.sequence, result)
        }))
    }

    /// Download the violations report and save it
    ///
    /// # Arguments
    /// * `dir` - Target directory; defaults to the configured export directory
    ///
    /// # Returns
    /// Where the report was written
    pub async fn export_report(&self, dir: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
        let dir = dir
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from(&self.settings.export_dir));

        let report = self
            .services
            .export
            .export_violations()
            .await
            .context("Download failed")?;

        save_report(&report, &dir, &self.settings.export_filename).await
    }

    /// Verify a captured frame against the known faces
    pub async fn face_login(&self, frame: MediaPayload) -> Result<AuthOutcome, ServiceError> {
        tracing::info!("Face login requested ({} bytes)", frame.len());
        let outcome = self.services.face_auth.verify_face(frame).await?;
        self.record_login(&outcome);
        Ok(outcome)
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, ServiceError> {
        tracing::info!("Credential login requested for {}", email);
        let outcome = self
            .services
            .credentials
            .login(email.to_string(), password.to_string())
            .await?;
        self.record_login(&outcome);
        Ok(outcome)
    }

    fn record_login(&self, outcome: &AuthOutcome) {
        match outcome {
            AuthOutcome::Success { user } => {
                tracing::info!("Signed in as {}", user);
                self.state.set_signed_in_user(Some(user.clone()));
            }
            AuthOutcome::Rejected { message } => {
                tracing::warn!("Login rejected: {}", message);
            }
        }
    }

    /// Release the session's display resources and log the session metrics
    pub fn shutdown(&self) -> usize {
        let released = self.state.close_session();
        let pending = self.state.read(|s| s.conversation.pending_count());
        if pending > 0 {
            tracing::warn!("Shutting down with {} unanswered question(s)", pending);
        }
        self.state.metrics().log_summary();
        released
    }
}

/// Flatten a service call that ran in its own task.
///
/// A panicked or cancelled call becomes a service failure so the round trip is
/// still completed against the session state.
fn settle<T>(
    joined: Result<Result<T, ServiceError>, JoinError>,
    what: &str,
) -> Result<T, ServiceError> {
    joined.unwrap_or_else(|e| {
        tracing::error!("The {} call did not finish: {}", what, e);
        Err(ServiceError::InvalidResponse(format!("{} task failed", what)))
    })
}

/// Read a file into a [`MediaPayload`] named after its final path component
pub async fn load_payload(path: &Utf8Path) -> Result<MediaPayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path))?;
    let name = path.file_name().unwrap_or(path.as_str());
    Ok(MediaPayload::new(name, bytes))
}
