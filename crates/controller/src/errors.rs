use std::io;
use std::time::Duration;
use thiserror::Error;

/// Reasons a session refuses to begin. No state changes when these are
/// returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("Camera not ready: {0}")]
    CameraNotReady(CameraNotReady),

    #[error("Employee name and ID are required before capture")]
    MissingIdentity,

    #[error("A capture session is already {0}")]
    SessionInProgress(&'static str),

    #[error("Capture controller has shut down")]
    ControllerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraNotReady {
    NoDevice,
    PermissionMissing,
}

impl std::fmt::Display for CameraNotReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraNotReady::NoDevice => f.write_str("no camera device initialized"),
            CameraNotReady::PermissionMissing => f.write_str("camera permission not granted"),
        }
    }
}

/// A single frame could not be acquired. Transient: the session keeps going.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Camera returned no frame path")]
    NoFramePath,

    #[error("Camera device error: {0}")]
    Device(String),

    #[error("Frame acquisition task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// The service answered with a non-success status.
    Status(u16),
    /// Connection, TLS or protocol failure before a response was received.
    Transport,
    /// The submission did not complete within the upload timeout.
    Timeout,
    /// A frame file could not be read for submission.
    Io,
}

/// Terminal failure of the batch submission, with enough detail for someone
/// to debug it from a log line or an alert.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Upload to {endpoint} failed after {elapsed:?} ({frames_attempted} frames): {message}")]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub message: String,
    pub endpoint: String,
    pub elapsed: Duration,
    pub frames_attempted: usize,
}

impl UploadError {
    pub fn new(
        kind: UploadErrorKind,
        message: impl Into<String>,
        endpoint: impl Into<String>,
        elapsed: Duration,
        frames_attempted: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            endpoint: endpoint.into(),
            elapsed,
            frames_attempted,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            UploadErrorKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

/// How a session that did start ended badly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("No frames were captured during the session")]
    NoFramesCaptured,

    #[error("Finalize task failed: {0}")]
    FinalizeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_messages() {
        assert_eq!(
            StartError::CameraNotReady(CameraNotReady::PermissionMissing).to_string(),
            "Camera not ready: camera permission not granted"
        );
        assert_eq!(
            StartError::SessionInProgress("finalizing").to_string(),
            "A capture session is already finalizing"
        );
    }

    #[test]
    fn upload_error_carries_diagnostics() {
        let err = UploadError::new(
            UploadErrorKind::Status(500),
            "internal error",
            "https://recognition.test/register",
            Duration::from_millis(1_250),
            18,
        );
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err.to_string(),
            "Upload to https://recognition.test/register failed after 1.25s (18 frames): internal error"
        );

        let session: SessionError = err.clone().into();
        assert_eq!(session.to_string(), err.to_string());
    }

    #[test]
    fn timeout_has_no_status() {
        let err = UploadError::new(UploadErrorKind::Timeout, "timed out", "x", Duration::ZERO, 1);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn acquisition_error_from_io() {
        let err: AcquisitionError = io::Error::other("device busy").into();
        assert_eq!(err.to_string(), "IO error: device busy");
    }
}
