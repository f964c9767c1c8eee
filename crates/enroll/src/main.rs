mod cli;
mod config;
mod render;

use anyhow::Context;
use capture::{
    CameraSlot, DeviceAccessRequester, FsFileStore, SyntheticFrameSource, V4lStillSource,
    camera_available,
};
use clap::Parser;
use cli::Args;
use common::{RetryPolicy, TelemetryGuard, setup_logging};
use config::EnrollConfig;
use controller::{
    CaptureController, ControllerHandle, FrameSource, PermissionRequester, PermissionStatus, Ports,
    SessionOutcome, SubjectIdentity,
};
use drafts::{EmployeeDraft, JsonDraftStore};
use std::sync::Arc;
use uploader::Uploader;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Generated frames need no device access.
struct SyntheticPermission;

impl PermissionRequester for SyntheticPermission {
    async fn request_camera_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = EnrollConfig::from_env()?;

    // TelemetryGuard installs the subscriber itself when exporting.
    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init("enroll", endpoint, config.environment)?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let drafts = Arc::new(JsonDraftStore::new(&config.draft_path));
    let saved = if args.resume {
        EmployeeDraft::restore(&drafts).await?.unwrap_or_default()
    } else {
        EmployeeDraft::default()
    };

    let upload_url = args.upload_url.clone().or_else(|| config.upload_url.clone());
    let synthetic = args.synthetic;
    let draft = args.into_draft(saved);
    draft.validate()?;
    draft.save(&drafts).await?;
    let subject = draft
        .subject()
        .context("Employee name and ID are required before capture")?;

    let uploader = Uploader::from_endpoint(upload_url.as_deref(), config.session.upload_timeout)?;

    let outcome = if synthetic {
        let source = SyntheticFrameSource::new(
            &config.capture_dir,
            SYNTHETIC_WIDTH,
            SYNTHETIC_HEIGHT,
            config.camera.jpeg_quality,
        )?;
        tracing::info!(dir = %source.capture_dir().display(), "Using synthetic frames");
        let checks = CameraChecks {
            requester: &SyntheticPermission,
            camera_ready: true,
            camera: None,
        };
        run_session(&config, source, checks, uploader, &drafts, &subject).await?
    } else {
        let requester = DeviceAccessRequester::new(&config.camera);
        let source =
            V4lStillSource::new(&config.camera, &config.capture_dir, RetryPolicy::default())?;
        tracing::info!(dir = %source.capture_dir().display(), "Capture directory ready");
        let checks = CameraChecks {
            requester: &requester,
            camera_ready: camera_available(&config.camera),
            camera: Some(source.camera()),
        };
        run_session(&config, source, checks, uploader, &drafts, &subject).await?
    };

    report(outcome, &drafts).await
}

/// What has to hold before the device is opened and capture may begin.
struct CameraChecks<'a, P> {
    requester: &'a P,
    camera_ready: bool,
    /// Device to open once ready and permitted; `None` when nothing needs opening.
    camera: Option<CameraSlot>,
}

async fn run_session<F, P>(
    config: &EnrollConfig,
    source: F,
    checks: CameraChecks<'_, P>,
    uploader: Uploader,
    drafts: &Arc<JsonDraftStore>,
    subject: &SubjectIdentity,
) -> anyhow::Result<SessionOutcome>
where
    F: FrameSource,
    P: PermissionRequester,
{
    let handle = CaptureController::spawn(
        config.session.clone(),
        Ports {
            frame_source: source,
            uploader,
            file_store: FsFileStore,
            draft_store: Arc::clone(drafts),
        },
    )?;

    prepare_camera(&handle, checks).await;

    let updates = render::follow(handle.subscribe(), config.session.clone());
    let started = handle
        .start_session(&subject.subject_id, &subject.subject_name)
        .await?;

    let render = tokio::spawn(updates);
    let stopper = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, finishing early");
                handle.stop_session().await;
            }
        })
    };

    let outcome = started
        .wait()
        .await
        .context("Capture controller stopped before the session finished")?;

    stopper.abort();
    render.abort();
    Ok(outcome)
}

/// Reports readiness, settles permission, then opens the device only if both
/// hold. A device that fails to open marks the camera not ready so the start
/// is refused with `CameraNotReady`.
async fn prepare_camera<P: PermissionRequester>(
    handle: &ControllerHandle,
    checks: CameraChecks<'_, P>,
) -> PermissionStatus {
    handle.set_camera_ready(checks.camera_ready).await;
    let permission = handle.ensure_permission(checks.requester).await;
    tracing::info!(?permission, camera_ready = checks.camera_ready, "Camera checks done");

    if let Some(camera) = checks.camera
        && checks.camera_ready
        && permission.is_granted()
    {
        match camera.open().await {
            Ok(()) => tracing::info!("Camera opened"),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Camera could not be opened");
                handle.set_camera_ready(false).await;
            }
        }
    }
    permission
}

async fn report(outcome: SessionOutcome, drafts: &JsonDraftStore) -> anyhow::Result<()> {
    let draft = EmployeeDraft::load(drafts).await?.unwrap_or_default();
    tracing::info!(
        employee_id = %outcome.subject().subject_id,
        video_recorded = draft.video_recorded,
        registered_on_ml = draft.registered_on_ml,
        "Draft updated"
    );

    match outcome {
        SessionOutcome::Succeeded { frames, ack, .. } => {
            tracing::info!(frames, status = ack.status, response = %ack.body, "Face registered");
            Ok(())
        }
        SessionOutcome::Failed { error, .. } => {
            tracing::error!(error = %error, "Face registration failed; draft kept for retry");
            Err(error.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::CameraConfig;
    use controller::{CameraNotReady, SessionConfig, StartError};
    use std::path::PathBuf;
    use std::time::Duration;

    struct Denying;

    impl PermissionRequester for Denying {
        async fn request_camera_permission(&self) -> PermissionStatus {
            PermissionStatus::Denied
        }
    }

    fn missing_camera() -> CameraConfig {
        CameraConfig {
            device_path: Some(PathBuf::from("/nonexistent/video9")),
            ..CameraConfig::default()
        }
    }

    fn single_attempt() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn spawn_controller(root: &std::path::Path) -> (ControllerHandle, CameraSlot) {
        let source = V4lStillSource::new(&missing_camera(), root, single_attempt()).unwrap();
        let camera = source.camera();
        let handle = CaptureController::spawn(
            SessionConfig::default(),
            Ports {
                frame_source: source,
                uploader: Uploader::from_endpoint(None, Duration::from_secs(1)).unwrap(),
                file_store: FsFileStore,
                draft_store: JsonDraftStore::new(root.join("drafts.json")),
            },
        )
        .unwrap();
        (handle, camera)
    }

    #[tokio::test]
    async fn failed_open_refuses_start() {
        let root = tempfile::tempdir().unwrap();
        let (handle, camera) = spawn_controller(root.path());

        let checks = CameraChecks {
            requester: &SyntheticPermission,
            camera_ready: true,
            camera: Some(camera.clone()),
        };
        assert_eq!(prepare_camera(&handle, checks).await, PermissionStatus::Granted);
        assert!(!camera.is_open());

        let err = handle.start_session("E-1023", "Aarav Sharma").await.unwrap_err();
        assert_eq!(err, StartError::CameraNotReady(CameraNotReady::NoDevice));
    }

    #[tokio::test]
    async fn denied_permission_skips_open() {
        let root = tempfile::tempdir().unwrap();
        let (handle, camera) = spawn_controller(root.path());

        let checks = CameraChecks {
            requester: &Denying,
            camera_ready: true,
            camera: Some(camera.clone()),
        };
        assert_eq!(prepare_camera(&handle, checks).await, PermissionStatus::Denied);
        assert!(!camera.is_open());

        let err = handle.start_session("E-1023", "Aarav Sharma").await.unwrap_err();
        assert_eq!(err, StartError::CameraNotReady(CameraNotReady::PermissionMissing));
    }

    #[tokio::test]
    async fn missing_device_is_reported_at_start() {
        let root = tempfile::tempdir().unwrap();
        let (handle, camera) = spawn_controller(root.path());

        let checks = CameraChecks {
            requester: &SyntheticPermission,
            camera_ready: false,
            camera: Some(camera),
        };
        prepare_camera(&handle, checks).await;

        let err = handle.start_session("E-1023", "Aarav Sharma").await.unwrap_err();
        assert_eq!(err, StartError::CameraNotReady(CameraNotReady::NoDevice));
    }
}
