use crate::capture_dir::CaptureDir;
use crate::config::CameraConfig;
use crate::device::{CameraDevice, PixelFormat};
use crate::encoder::{FrameEncoder, MjpegPassthrough, YuyvEncoder};
use anyhow::{Context, Result};
use common::RetryPolicy;
use controller::{AcquisitionError, FrameSource};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use v4l::{
    Device,
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
};

const BUFFER_COUNT: u32 = 4;

struct StillStream<'a> {
    stream: Stream<'a>,
}

impl<'a> StillStream<'a> {
    fn new(device: &'a Device) -> Result<Self> {
        let stream = Stream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
            .context("Failed to create capture stream")?;
        Ok(Self { stream })
    }

    /// Discard queued frames so the still reflects the present.
    fn flush(&mut self, count: usize) -> usize {
        (0..count)
            .take_while(|_| self.stream.next().is_ok())
            .count()
    }

    fn next_frame(&mut self) -> Result<&[u8]> {
        let (data, _meta) = self.stream.next().context("Failed to dequeue frame")?;
        Ok(data)
    }
}

struct StillCamera {
    camera: CameraDevice,
    encoder: Box<dyn FrameEncoder>,
    flush_frames: usize,
}

impl StillCamera {
    fn grab_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut stream = StillStream::new(&self.camera.device)?;
        let flushed = stream.flush(self.flush_frames);
        tracing::trace!(flushed, "Flushed stale buffers");

        let raw = stream.next_frame()?;
        self.encoder
            .encode(raw, self.camera.width, self.camera.height)
    }
}

type SharedCamera = Arc<Mutex<Option<StillCamera>>>;

fn lock_camera(
    camera: &SharedCamera,
) -> Result<MutexGuard<'_, Option<StillCamera>>, AcquisitionError> {
    camera
        .lock()
        .map_err(|_| AcquisitionError::Device("camera state poisoned".to_string()))
}

/// Opens the device behind a [`V4lStillSource`] once readiness and permission
/// have been confirmed. Clones share the same camera.
#[derive(Clone)]
pub struct CameraSlot {
    camera: SharedCamera,
    config: CameraConfig,
    retry: RetryPolicy,
}

impl CameraSlot {
    /// Opens and configures the camera on the blocking pool, retrying per the
    /// source's policy. A camera that is already open is kept.
    pub async fn open(&self) -> Result<()> {
        let camera = Arc::clone(&self.camera);
        let config = self.config.clone();
        let retry = self.retry.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut slot = lock_camera(&camera)?;
            if slot.is_some() {
                return Ok(());
            }
            let device = CameraDevice::open(&config, &retry)
                .context("Failed to initialize camera - check V4L2 device availability")?;
            let encoder: Box<dyn FrameEncoder> = match device.pixel_format {
                PixelFormat::Yuyv => Box::new(YuyvEncoder::new(config.jpeg_quality)),
                PixelFormat::Mjpeg => Box::new(MjpegPassthrough::new()?),
            };
            *slot = Some(StillCamera {
                camera: device,
                encoder,
                flush_frames: config.flush_frames,
            });
            Ok(())
        })
        .await
        .context("Camera open task failed")?
    }

    pub fn is_open(&self) -> bool {
        lock_camera(&self.camera).is_ok_and(|slot| slot.is_some())
    }
}

/// Frame source backed by a V4L2 camera. Each call streams just long enough
/// to grab one fresh frame and writes it as a JPEG file. The device is not
/// touched until [`CameraSlot::open`] succeeds.
pub struct V4lStillSource {
    slot: CameraSlot,
    dir: CaptureDir,
}

impl V4lStillSource {
    pub fn new(config: &CameraConfig, capture_root: &Path, retry: RetryPolicy) -> Result<Self> {
        let dir = CaptureDir::create(capture_root).with_context(|| {
            format!("Failed to create capture dir in {}", capture_root.display())
        })?;

        Ok(Self {
            slot: CameraSlot {
                camera: Arc::new(Mutex::new(None)),
                config: config.clone(),
                retry,
            },
            dir,
        })
    }

    pub fn camera(&self) -> CameraSlot {
        self.slot.clone()
    }

    pub fn capture_dir(&self) -> &Path {
        self.dir.path()
    }
}

impl FrameSource for V4lStillSource {
    async fn acquire_frame(&mut self) -> Result<PathBuf, AcquisitionError> {
        let path = self.dir.next_frame_path();
        let camera = Arc::clone(&self.slot.camera);
        let target = path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), AcquisitionError> {
            let mut slot = lock_camera(&camera)?;
            let camera = slot
                .as_mut()
                .ok_or_else(|| AcquisitionError::Device("camera not opened".to_string()))?;
            let jpeg = camera
                .grab_jpeg()
                .map_err(|e| AcquisitionError::Device(format!("{e:#}")))?;
            std::fs::write(&target, jpeg)?;
            Ok(())
        })
        .await
        .map_err(|e| AcquisitionError::TaskFailed(e.to_string()))??;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

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

    #[tokio::test]
    async fn unopened_camera_yields_device_error() {
        let root = tempfile::tempdir().unwrap();
        let mut source =
            V4lStillSource::new(&missing_camera(), root.path(), single_attempt()).unwrap();

        assert!(!source.camera().is_open());
        let err = source.acquire_frame().await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Device(msg) if msg == "camera not opened"));
    }

    #[tokio::test]
    async fn failed_open_leaves_slot_empty() {
        let root = tempfile::tempdir().unwrap();
        let source =
            V4lStillSource::new(&missing_camera(), root.path(), single_attempt()).unwrap();
        let camera = source.camera();

        assert!(camera.open().await.is_err());
        assert!(!camera.is_open());
        assert!(source.capture_dir().starts_with(root.path()));
    }
}
