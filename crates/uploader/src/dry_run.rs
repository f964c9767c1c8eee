use controller::{AckPayload, BatchUploader, SubjectIdentity, UploadError, UploadErrorKind};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

pub const DRY_RUN_ENDPOINT: &str = "dry-run://local";

/// Acknowledges batches without sending them. Frames must still exist on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunUploader;

impl BatchUploader for DryRunUploader {
    fn endpoint(&self) -> &str {
        DRY_RUN_ENDPOINT
    }

    async fn submit(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        _timeout: Duration,
    ) -> Result<AckPayload, UploadError> {
        let started = Instant::now();
        let mut bytes = 0u64;
        for path in paths {
            let meta = tokio::fs::metadata(path).await.map_err(|e| {
                UploadError::new(
                    UploadErrorKind::Io,
                    format!("{}: {e}", path.display()),
                    DRY_RUN_ENDPOINT,
                    started.elapsed(),
                    paths.len(),
                )
            })?;
            bytes += meta.len();
        }

        tracing::info!(
            employee_id = %subject.subject_id,
            frames = paths.len(),
            bytes,
            "Simulated batch registration"
        );
        Ok(AckPayload {
            status: 200,
            body: json!({
                "simulated": true,
                "employeeId": subject.subject_id,
                "frames": paths.len(),
            }),
        })
    }
}
