use capture::CameraConfig;
use common::{Environment, env_opt};
use controller::SessionConfig;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EnrollConfig {
    pub environment: Environment,
    pub session: SessionConfig,
    pub camera: CameraConfig,
    /// Recognition service endpoint; unset means batches are acknowledged locally.
    pub upload_url: Option<String>,
    pub capture_dir: PathBuf,
    pub draft_path: PathBuf,
    pub otel_endpoint: Option<String>,
}

impl EnrollConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            session: SessionConfig::from_env()?,
            camera: CameraConfig::from_env()?,
            upload_url: env_opt("UPLOAD_URL"),
            capture_dir: env_opt("CAPTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("enroll")),
            draft_path: env_opt("DRAFT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".enroll/drafts.json")),
            otel_endpoint: env_opt("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}
