use common::{env_opt, env_or};
use std::path::PathBuf;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// V4L2 index, used when no explicit device node is given.
    pub device_id: u32,
    pub device_path: Option<PathBuf>,
    /// Audio capture node that must also be accessible before capture, e.g.
    /// `/dev/snd/pcmC0D0c`.
    pub microphone_path: Option<PathBuf>,
    pub jpeg_quality: u8,
    /// Buffered frames dropped before each still so it reflects the present.
    pub flush_frames: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            device_path: None,
            microphone_path: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            flush_frames: 2,
        }
    }
}

impl CameraConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            device_id: env_or("CAMERA_DEVICE_ID", 0),
            device_path: env_opt("CAMERA_DEVICE_PATH").map(PathBuf::from),
            microphone_path: env_opt("MICROPHONE_DEVICE_PATH").map(PathBuf::from),
            jpeg_quality: env_or("JPEG_QUALITY", DEFAULT_JPEG_QUALITY),
            flush_frames: env_or("CAMERA_FLUSH_FRAMES", 2),
        };
        anyhow::ensure!(
            (1..=100).contains(&config.jpeg_quality),
            "JPEG_QUALITY must be between 1 and 100, got {}",
            config.jpeg_quality
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn reads_device_from_env() {
        unsafe {
            env::set_var("CAMERA_DEVICE_ID", "2");
            env::set_var("CAMERA_DEVICE_PATH", "/dev/video2");
        }
        let config = CameraConfig::from_env().unwrap();
        unsafe {
            env::remove_var("CAMERA_DEVICE_ID");
            env::remove_var("CAMERA_DEVICE_PATH");
        }

        assert_eq!(config.device_id, 2);
        assert_eq!(config.device_path, Some(PathBuf::from("/dev/video2")));
        assert_eq!(config.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    #[serial]
    fn rejects_zero_quality() {
        unsafe { env::set_var("JPEG_QUALITY", "0") };
        let result = CameraConfig::from_env();
        unsafe { env::remove_var("JPEG_QUALITY") };
        assert!(result.is_err());
    }
}
