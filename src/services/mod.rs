//! Services module - boundary to the backend collaborators.
//!
//! The session core only depends on the payload-in / payload-or-error-out shape
//! of each collaborator, so every one of them is an async trait here:
//!
//! - [`DetectionService`]: image in, annotated image out (`POST /detect`)
//! - [`ConversationService`]: question in, answer out (`POST /ask`)
//! - [`ExportService`]: violations CSV out (`GET /download_violations`)
//! - [`FaceAuthService`]: captured frame in, identity out (`POST /face-login`)
//! - [`CredentialAuthService`]: email/password in, identity out (`POST /login`)
//! - [`ReportMailService`]: asks the backend to mail the violations report (`POST /send-mail`)
//!
//! [`ApiClient`] implements all of them over HTTP with `reqwest`. Each call is
//! independently issuable; no ordering is assumed between them.
//!
//! # Error mapping
//!
//! Every transport or service failure becomes a [`ServiceError`]. What a failure
//! *means* (Failed status, an error transcript entry, a message to the caller)
//! is decided by the controllers, not here.

pub mod api;
pub mod export;

pub use api::ApiClient;
pub use export::{ExportedReport, filename_from_content_disposition, save_report};

use crate::models::MediaPayload;
use async_trait::async_trait;
use thiserror::Error;

/// Transport or service failure of a backend round trip
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                code: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Result of a face or credential login attempt that reached the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { user: String },
    Rejected { message: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Run detection on `image` and return the annotated image bytes
    async fn detect(&self, image: MediaPayload) -> Result<Vec<u8>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn ask(&self, question: String) -> Result<String, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExportService: Send + Sync {
    async fn export_violations(&self) -> Result<ExportedReport, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceAuthService: Send + Sync {
    async fn verify_face(&self, frame: MediaPayload) -> Result<AuthOutcome, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialAuthService: Send + Sync {
    async fn login(&self, email: String, password: String) -> Result<AuthOutcome, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportMailService: Send + Sync {
    async fn send_report(&self) -> Result<(), ServiceError>;
}
