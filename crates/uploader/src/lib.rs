pub mod dry_run;
pub mod http;

pub use dry_run::DryRunUploader;
pub use http::HttpBatchUploader;

use controller::{AckPayload, BatchUploader, SubjectIdentity, UploadError};
use std::path::PathBuf;
use std::time::Duration;

/// The uploader picked at startup: the recognition service when an endpoint
/// is configured, a local acknowledger otherwise.
pub enum Uploader {
    Http(HttpBatchUploader),
    DryRun(DryRunUploader),
}

impl Uploader {
    pub fn from_endpoint(endpoint: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        match endpoint {
            Some(url) => Ok(Self::Http(HttpBatchUploader::new(url, timeout)?)),
            None => {
                tracing::warn!("No upload URL configured; batches will be acknowledged locally");
                Ok(Self::DryRun(DryRunUploader))
            }
        }
    }
}

impl BatchUploader for Uploader {
    fn endpoint(&self) -> &str {
        match self {
            Uploader::Http(http) => http.endpoint(),
            Uploader::DryRun(dry) => dry.endpoint(),
        }
    }

    async fn submit(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        timeout: Duration,
    ) -> Result<AckPayload, UploadError> {
        match self {
            Uploader::Http(http) => http.submit(paths, subject, timeout).await,
            Uploader::DryRun(dry) => dry.submit(paths, subject, timeout).await,
        }
    }
}
