use crate::config::CameraConfig;
use controller::{PermissionRequester, PermissionStatus};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Camera access on Linux is file access to the video node. A node the user
/// cannot open (wrong group) needs an administrator, so it reports `Blocked`.
/// When a microphone node is configured it must be accessible too.
#[derive(Debug, Clone)]
pub struct DeviceAccessRequester {
    camera: PathBuf,
    microphone: Option<PathBuf>,
}

impl DeviceAccessRequester {
    pub fn new(config: &CameraConfig) -> Self {
        let camera = config
            .device_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/dev/video{}", config.device_id)));
        Self {
            camera,
            microphone: config.microphone_path.clone(),
        }
    }
}

async fn node_access(node: &Path) -> PermissionStatus {
    match tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(node)
        .await
    {
        Ok(_) => PermissionStatus::Granted,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!(
                node = %node.display(),
                "No access to device node; check the user's groups"
            );
            PermissionStatus::Blocked
        }
        Err(e) => {
            tracing::warn!(node = %node.display(), error = %e, "Device node unavailable");
            PermissionStatus::Denied
        }
    }
}

impl PermissionRequester for DeviceAccessRequester {
    async fn request_camera_permission(&self) -> PermissionStatus {
        let camera = node_access(&self.camera).await;
        match &self.microphone {
            Some(mic) => camera.combine(node_access(mic).await),
            None => camera,
        }
    }
}
