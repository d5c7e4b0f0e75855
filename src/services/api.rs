use crate::models::{ApiSettings, MediaPayload};
use crate::services::{
    AuthOutcome, ConversationService, CredentialAuthService, DetectionService, ExportService,
    ExportedReport, FaceAuthService, ReportMailService, ServiceError,
    filename_from_content_disposition,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

// --- Request / response bodies ---

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    user: Option<String>,
}

/// FastAPI wraps `HTTPException` payloads in `{"detail": ...}`
#[derive(Deserialize)]
struct ErrorEnvelope {
    detail: LoginResponse,
}

#[derive(Debug, Deserialize)]
struct FaceLoginResponse {
    status: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    message: String,
}

/// HTTP client for the detection backend.
///
/// One `reqwest::Client` (connection pool, timeout) is shared by every call.
/// Cloning is cheap and clones share the pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /` - returns the backend's status message
    pub async fn health(&self) -> Result<String, ServiceError> {
        let response = self.client.get(self.url("/")).send().await?;
        let body: HealthResponse = ensure_success(response).await?.json().await?;
        Ok(body.message)
    }
}

/// Turn a non-2xx response into [`ServiceError::Status`], keeping a short body excerpt.
async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> ServiceError {
    let excerpt: String = body.chars().take(200).collect();
    let message = if excerpt.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    } else {
        excerpt
    };

    ServiceError::Status {
        code: status.as_u16(),
        message,
    }
}

/// Content type of an upload, guessed from its file name
fn content_type(file_name: &str) -> mime_guess::Mime {
    mime_guess::from_path(file_name).first_or_octet_stream()
}

fn image_form(payload: &MediaPayload) -> Result<Form, ServiceError> {
    let part = Part::bytes(payload.bytes.to_vec())
        .file_name(payload.file_name.clone())
        .mime_str(content_type(&payload.file_name).essence_str())?;
    Ok(Form::new().part("file", part))
}

fn face_outcome(body: FaceLoginResponse) -> Result<AuthOutcome, ServiceError> {
    if body.status == "success" {
        let user = body.user.ok_or_else(|| {
            ServiceError::InvalidResponse("face login succeeded without a user".to_string())
        })?;
        Ok(AuthOutcome::Success { user })
    } else {
        Ok(AuthOutcome::Rejected {
            message: body
                .message
                .unwrap_or_else(|| "No matching face found".to_string()),
        })
    }
}

fn login_outcome(body: LoginResponse) -> AuthOutcome {
    match (body.success, body.user) {
        (true, Some(user)) => AuthOutcome::Success { user },
        (true, None) => AuthOutcome::Success {
            user: String::from("unknown"),
        },
        (false, _) => AuthOutcome::Rejected {
            message: body.message,
        },
    }
}

#[async_trait]
impl DetectionService for ApiClient {
    async fn detect(&self, image: MediaPayload) -> Result<Vec<u8>, ServiceError> {
        tracing::debug!("POST /detect ({}, {} bytes)", image.file_name, image.len());

        let response = self
            .client
            .post(self.url("/detect"))
            .multipart(image_form(&image)?)
            .send()
            .await?;

        let bytes = ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ConversationService for ApiClient {
    async fn ask(&self, question: String) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(self.url("/ask"))
            .json(&AskRequest {
                question: &question,
            })
            .send()
            .await?;

        let body: AskResponse = ensure_success(response).await?.json().await?;
        Ok(body.answer)
    }
}

#[async_trait]
impl ExportService for ApiClient {
    async fn export_violations(&self) -> Result<ExportedReport, ServiceError> {
        let response = self
            .client
            .get(self.url("/download_violations"))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_content_disposition);

        let bytes = response.bytes().await?.to_vec();
        Ok(ExportedReport { filename, bytes })
    }
}

#[async_trait]
impl FaceAuthService for ApiClient {
    async fn verify_face(&self, frame: MediaPayload) -> Result<AuthOutcome, ServiceError> {
        let response = self
            .client
            .post(self.url("/face-login"))
            .multipart(image_form(&frame)?)
            .send()
            .await?;

        let body: FaceLoginResponse = ensure_success(response).await?.json().await?;
        face_outcome(body)
    }
}

#[async_trait]
impl CredentialAuthService for ApiClient {
    async fn login(&self, email: String, password: String) -> Result<AuthOutcome, ServiceError> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest {
                email: &email,
                password: &password,
            })
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await?;
            return match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => Ok(login_outcome(envelope.detail)),
                Err(_) => Ok(AuthOutcome::Rejected {
                    message: "Invalid credentials".to_string(),
                }),
            };
        }

        let body: LoginResponse = ensure_success(response).await?.json().await?;
        Ok(login_outcome(body))
    }
}

#[async_trait]
impl ReportMailService for ApiClient {
    async fn send_report(&self) -> Result<(), ServiceError> {
        let response = self.client.post(self.url("/send-mail")).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
