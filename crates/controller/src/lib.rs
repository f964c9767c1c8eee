pub mod config;
pub mod errors;
pub mod finalize;
pub mod metrics;
pub mod permission;
pub mod ports;
pub mod service;
pub mod state_machine;
pub mod timers;

pub use config::SessionConfig;
pub use errors::{
    AcquisitionError, CameraNotReady, SessionError, StartError, UploadError, UploadErrorKind,
};
pub use finalize::SessionOutcome;
pub use permission::PermissionStatus;
pub use ports::{
    AckPayload, BatchUploader, DraftStore, EMPLOYEE_DRAFT_KEY, FIELD_REGISTERED_ON_ML,
    FIELD_RESTORE, FIELD_VIDEO_RECORDED, FileStore, FrameSource, PermissionRequester,
    RESTORE_DRAFT_KEY, SubjectIdentity,
};
pub use service::{CaptureController, ControllerHandle, Ports, SessionSnapshot, Started};
pub use state_machine::SessionState;
