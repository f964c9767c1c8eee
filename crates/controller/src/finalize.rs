use crate::config::SessionConfig;
use crate::errors::{SessionError, UploadError, UploadErrorKind};
use crate::metrics::SessionMetrics;
use crate::ports::{
    AckPayload, BatchUploader, DraftStore, EMPLOYEE_DRAFT_KEY, FIELD_REGISTERED_ON_ML,
    FIELD_RESTORE, FIELD_VIDEO_RECORDED, FileStore, FrameSource, RESTORE_DRAFT_KEY,
    SubjectIdentity,
};
use crate::state_machine::FinalizeBatch;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Succeeded {
        subject: SubjectIdentity,
        frames: usize,
        ack: AckPayload,
    },
    Failed {
        subject: SubjectIdentity,
        error: SessionError,
    },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded { .. })
    }

    pub fn subject(&self) -> &SubjectIdentity {
        match self {
            SessionOutcome::Succeeded { subject, .. } | SessionOutcome::Failed { subject, .. } => {
                subject
            }
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Succeeded { .. } => "success",
            SessionOutcome::Failed {
                error: SessionError::NoFramesCaptured,
                ..
            } => "no_frames",
            SessionOutcome::Failed {
                error: SessionError::FinalizeFailed(_),
                ..
            } => "finalize_failed",
            SessionOutcome::Failed { .. } => "upload_failed",
        }
    }
}

pub(crate) struct Collaborators<F, U, S, D> {
    pub source: Arc<Mutex<F>>,
    pub uploader: Arc<U>,
    pub files: Arc<S>,
    pub drafts: Arc<D>,
}

impl<F, U, S, D> Clone for Collaborators<F, U, S, D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            uploader: Arc::clone(&self.uploader),
            files: Arc::clone(&self.files),
            drafts: Arc::clone(&self.drafts),
        }
    }
}

impl<F, U, S, D> Collaborators<F, U, S, D>
where
    F: FrameSource,
    U: BatchUploader,
    S: FileStore,
    D: DraftStore,
{
    /// Upload, cleanup and outcome persistence for one finished capture.
    /// Runs after every timer of the session is gone.
    pub async fn finalize(
        &self,
        batch: FinalizeBatch,
        config: &SessionConfig,
        metrics: &SessionMetrics,
    ) -> SessionOutcome {
        let FinalizeBatch {
            epoch,
            subject,
            mut paths,
            dropped_frames,
        } = batch;

        tracing::info!(
            epoch,
            frames = paths.len(),
            dropped_frames,
            "Finalizing capture session"
        );

        if paths.is_empty()
            && let Some(path) = self.last_chance_frame(epoch).await
        {
            paths.push(path);
        }

        if paths.is_empty() {
            tracing::error!(epoch, "No frames captured; skipping upload");
            self.record_outcome(false).await;
            return SessionOutcome::Failed {
                subject,
                error: SessionError::NoFramesCaptured,
            };
        }

        paths.truncate(config.max_batch_frames);
        let frames = paths.len();

        match self.upload(&paths, &subject, config, metrics).await {
            Ok(ack) => {
                tracing::info!(epoch, frames, status = ack.status, "Batch registered");
                self.cleanup(paths).await;
                self.record_outcome(true).await;
                SessionOutcome::Succeeded {
                    subject,
                    frames,
                    ack,
                }
            }
            Err(e) => {
                // Frames stay on disk so a retry or a human can use them.
                tracing::error!(
                    epoch,
                    error = %e,
                    status = ?e.status(),
                    "Batch upload failed; keeping local frames"
                );
                self.record_outcome(false).await;
                SessionOutcome::Failed {
                    subject,
                    error: SessionError::Upload(e),
                }
            }
        }
    }

    async fn last_chance_frame(&self, epoch: u64) -> Option<PathBuf> {
        tracing::warn!(epoch, "Empty batch at finalize, attempting one last frame");
        let mut source = self.source.lock().await;
        match source.acquire_frame().await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(epoch, error = %e, "Last-chance frame failed");
                None
            }
        }
    }

    async fn upload(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        config: &SessionConfig,
        metrics: &SessionMetrics,
    ) -> Result<AckPayload, UploadError> {
        let started = Instant::now();
        let submission = self
            .uploader
            .submit(paths, subject, config.upload_timeout);

        let result = match tokio::time::timeout(config.upload_timeout, submission).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::new(
                UploadErrorKind::Timeout,
                format!("no response within {:?}", config.upload_timeout),
                self.uploader.endpoint(),
                started.elapsed(),
                paths.len(),
            )),
        };

        metrics.upload_finished(started.elapsed(), result.is_ok());
        result
    }

    async fn cleanup(&self, paths: Vec<PathBuf>) {
        let mut deletes = JoinSet::new();
        for path in paths {
            let files = Arc::clone(&self.files);
            deletes.spawn(async move {
                if let Err(e) = files.delete(&path).await {
                    tracing::debug!(path = %path.display(), error = %e, "Frame cleanup failed");
                }
            });
        }
        while deletes.join_next().await.is_some() {}
    }

    async fn record_outcome(&self, registered: bool) {
        let fields = [
            (FIELD_VIDEO_RECORDED, true),
            (FIELD_REGISTERED_ON_ML, registered),
        ];
        if let Err(e) = self.drafts.merge_record(EMPLOYEE_DRAFT_KEY, &fields).await {
            tracing::warn!(error = %e, "Failed to persist capture outcome");
        }
        if let Err(e) = self
            .drafts
            .merge_record(RESTORE_DRAFT_KEY, &[(FIELD_RESTORE, true)])
            .await
        {
            tracing::warn!(error = %e, "Failed to set draft restore flag");
        }
    }
}
