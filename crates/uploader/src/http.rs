use anyhow::Context;
use controller::{AckPayload, BatchUploader, SubjectIdentity, UploadError, UploadErrorKind};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

/// Posts a whole batch as one multipart request:
/// `employeeId`, `fullName`, then one `frames` part per still.
pub struct HttpBatchUploader {
    client: Client,
    endpoint: String,
}

impl HttpBatchUploader {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn build_form(
        paths: &[PathBuf],
        subject: &SubjectIdentity,
    ) -> Result<Form, (UploadErrorKind, String)> {
        let mut form = Form::new()
            .text("employeeId", subject.subject_id.clone())
            .text("fullName", subject.subject_name.clone());

        for (n, path) in paths.iter().enumerate() {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| (UploadErrorKind::Io, format!("{}: {e}", path.display())))?;
            let part = Part::bytes(bytes)
                .file_name(format!("frame_{n}.jpg"))
                .mime_str("image/jpeg")
                .map_err(|e| (UploadErrorKind::Transport, e.to_string()))?;
            form = form.part("frames", part);
        }
        Ok(form)
    }
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn transport_kind(e: &reqwest::Error) -> UploadErrorKind {
    if e.is_timeout() {
        UploadErrorKind::Timeout
    } else {
        UploadErrorKind::Transport
    }
}

impl BatchUploader for HttpBatchUploader {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        timeout: Duration,
    ) -> Result<AckPayload, UploadError> {
        let started = Instant::now();
        let fail = |kind: UploadErrorKind, message: String| {
            UploadError::new(kind, message, &self.endpoint, started.elapsed(), paths.len())
        };

        let form = Self::build_form(paths, subject)
            .await
            .map_err(|(kind, message)| fail(kind, message))?;

        tracing::info!(
            endpoint = %self.endpoint,
            employee_id = %subject.subject_id,
            frames = paths.len(),
            "Submitting capture batch"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| fail(transport_kind(&e), format!("{e:#}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| fail(transport_kind(&e), format!("failed to read response: {e:#}")))?;

        if !status.is_success() {
            return Err(fail(
                UploadErrorKind::Status(status.as_u16()),
                format!("{status}: {}", truncate_body(&body)),
            ));
        }

        let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
        Ok(AckPayload {
            status: status.as_u16(),
            body,
        })
    }
}
