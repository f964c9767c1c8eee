//! Collaborators the controller drives but does not implement.

use crate::errors::{AcquisitionError, UploadError};
use crate::permission::PermissionStatus;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Draft record the add-employee form reads back when it regains focus.
pub const EMPLOYEE_DRAFT_KEY: &str = "addEmployeeDraft";
/// Flag record telling the form to restore its draft instead of starting blank.
pub const RESTORE_DRAFT_KEY: &str = "restoreAddEmployee";

pub const FIELD_VIDEO_RECORDED: &str = "videoRecorded";
pub const FIELD_REGISTERED_ON_ML: &str = "registeredOnML";
pub const FIELD_RESTORE: &str = "restore";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectIdentity {
    pub subject_id: String,
    pub subject_name: String,
}

impl SubjectIdentity {
    /// Trims both fields; `None` when either ends up empty.
    pub fn new(subject_id: &str, subject_name: &str) -> Option<Self> {
        let subject_id = subject_id.trim();
        let subject_name = subject_name.trim();
        if subject_id.is_empty() || subject_name.is_empty() {
            return None;
        }
        Some(Self {
            subject_id: subject_id.to_string(),
            subject_name: subject_name.to_string(),
        })
    }
}

/// What the recognition service answered on a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub status: u16,
    pub body: serde_json::Value,
}

/// One still image per call. Not re-entrant: the controller never calls it
/// again before the previous call settles.
pub trait FrameSource: Send + 'static {
    fn acquire_frame(&mut self)
    -> impl Future<Output = Result<PathBuf, AcquisitionError>> + Send;
}

/// Single network submission of a whole batch.
pub trait BatchUploader: Send + Sync + 'static {
    /// Where batches go; used in diagnostics.
    fn endpoint(&self) -> &str;

    fn submit(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        timeout: Duration,
    ) -> impl Future<Output = Result<AckPayload, UploadError>> + Send;
}

/// Temporary capture file removal. Failures are logged and ignored.
pub trait FileStore: Send + Sync + 'static {
    fn delete(&self, path: &Path) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Last-write-wins key/value persistence that survives screen changes.
pub trait DraftStore: Send + Sync + 'static {
    fn merge_record(
        &self,
        key: &str,
        fields: &[(&str, bool)],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Lets the host keep reading a store it also handed to the controller.
impl<T: DraftStore> DraftStore for Arc<T> {
    fn merge_record(
        &self,
        key: &str,
        fields: &[(&str, bool)],
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).merge_record(key, fields)
    }
}

pub trait PermissionRequester: Send + Sync {
    fn request_camera_permission(&self) -> impl Future<Output = PermissionStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_both_fields() {
        assert!(SubjectIdentity::new("E-1023", "").is_none());
        assert!(SubjectIdentity::new("   ", "Aarav Sharma").is_none());

        let subject = SubjectIdentity::new(" E-1023 ", " Aarav Sharma").unwrap();
        assert_eq!(subject.subject_id, "E-1023");
        assert_eq!(subject.subject_name, "Aarav Sharma");
    }
}
