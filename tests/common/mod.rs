//! Shared fakes for integration tests
//!
//! [`Gated`] holds each service call open until the test releases it, which
//! lets a test decide the order in which round trips complete.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ppewatch::models::{MediaPayload, SessionSettings};
use ppewatch::services::{
    AuthOutcome, ConversationService, CredentialAuthService, DetectionService, ExportService,
    ExportedReport, FaceAuthService, ReportMailService, ServiceError,
};
use ppewatch::{AppController, Services, StateManager};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

pub type Release<T> = oneshot::Sender<Result<T, ServiceError>>;

/// A service whose calls block until the matching gate is released.
///
/// Calls are keyed by file name (detection) or question text (conversation).
pub struct Gated<T> {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<T, ServiceError>>>>,
}

impl<T: Send> Gated<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// Register a gate for `key`; must happen before the call is issued
    pub fn gate(&self, key: &str) -> Release<T> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(key.to_string(), rx);
        tx
    }

    async fn wait(&self, key: &str) -> Result<T, ServiceError> {
        let gate = self.gates.lock().remove(key);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ServiceError::Network("gate dropped".to_string()))),
            None => Err(ServiceError::InvalidResponse(format!("no gate for {}", key))),
        }
    }
}

#[async_trait]
impl DetectionService for Gated<Vec<u8>> {
    async fn detect(&self, image: MediaPayload) -> Result<Vec<u8>, ServiceError> {
        self.wait(&image.file_name).await
    }
}

#[async_trait]
impl ConversationService for Gated<String> {
    async fn ask(&self, question: String) -> Result<String, ServiceError> {
        self.wait(&question).await
    }
}

/// Every call fails as if the backend were unreachable
pub struct Offline;

fn offline<T>() -> Result<T, ServiceError> {
    Err(ServiceError::Network("connection refused".to_string()))
}

#[async_trait]
impl DetectionService for Offline {
    async fn detect(&self, _image: MediaPayload) -> Result<Vec<u8>, ServiceError> {
        offline()
    }
}

#[async_trait]
impl ConversationService for Offline {
    async fn ask(&self, _question: String) -> Result<String, ServiceError> {
        offline()
    }
}

#[async_trait]
impl ExportService for Offline {
    async fn export_violations(&self) -> Result<ExportedReport, ServiceError> {
        offline()
    }
}

#[async_trait]
impl FaceAuthService for Offline {
    async fn verify_face(&self, _frame: MediaPayload) -> Result<AuthOutcome, ServiceError> {
        offline()
    }
}

#[async_trait]
impl CredentialAuthService for Offline {
    async fn login(&self, _email: String, _password: String) -> Result<AuthOutcome, ServiceError> {
        offline()
    }
}

#[async_trait]
impl ReportMailService for Offline {
    async fn send_report(&self) -> Result<(), ServiceError> {
        offline()
    }
}

/// Controller on the current runtime with the given detection and chat
/// services; everything else is offline and report mail is disabled
pub fn controller(
    detection: Arc<dyn DetectionService>,
    conversation: Arc<dyn ConversationService>,
) -> AppController {
    let offline = Arc::new(Offline);
    let services = Services {
        detection,
        conversation,
        export: offline.clone(),
        face_auth: offline.clone(),
        credentials: offline.clone(),
        mail: offline,
    };
    let settings = SessionSettings {
        notify_on_detect: false,
        ..SessionSettings::default()
    };

    AppController::new(
        Arc::new(StateManager::new()),
        services,
        settings,
        tokio::runtime::Handle::current(),
    )
}

pub fn image(name: &str) -> MediaPayload {
    MediaPayload::new(name, name.as_bytes().to_vec())
}

/// Panics on its first call, answers normally afterwards
pub struct PanicsOnce {
    tripped: std::sync::atomic::AtomicBool,
}

impl PanicsOnce {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tripped: std::sync::atomic::AtomicBool::new(false),
        })
    }

    fn trip(&self) {
        if !self.tripped.swap(true, std::sync::atomic::Ordering::SeqCst) {
            panic!("backend client crashed");
        }
    }
}

#[async_trait]
impl DetectionService for PanicsOnce {
    async fn detect(&self, image: MediaPayload) -> Result<Vec<u8>, ServiceError> {
        self.trip();
        Ok(image.bytes.to_vec())
    }
}

#[async_trait]
impl ConversationService for PanicsOnce {
    async fn ask(&self, question: String) -> Result<String, ServiceError> {
        self.trip();
        Ok(format!("re: {}", question))
    }
}
