use crate::config::CameraConfig;
use anyhow::{Context, Result, anyhow};
use common::RetryPolicy;
use v4l::{
    Device, FourCC,
    control::{Control, Value},
    video::Capture,
};

const FOURCC_YUYV: FourCC = FourCC { repr: *b"YUYV" };
const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

// V4L2 control IDs (from videodev2.h)
const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a0901;
const V4L2_CID_FOCUS_AUTO: u32 = 0x009a090c;

const V4L2_EXPOSURE_AUTO: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuyv,
    Mjpeg,
}

fn find_usable_camera() -> Option<u32> {
    v4l::context::enum_devices()
        .into_iter()
        .find(|dev| {
            Device::with_path(dev.path())
                .and_then(|d| d.query_caps())
                .map(|caps| {
                    caps.capabilities
                        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                })
                .unwrap_or(false)
        })
        .map(|dev| dev.index() as u32)
}

/// Whether any capture-capable video node exists. Used as the "camera
/// device initialized" signal before a session is allowed to start.
pub fn camera_available(config: &CameraConfig) -> bool {
    match &config.device_path {
        Some(path) => Device::with_path(path)
            .and_then(|d| d.query_caps())
            .is_ok(),
        None => find_usable_camera().is_some(),
    }
}

fn open_device(config: &CameraConfig) -> Result<Device> {
    if let Some(path) = &config.device_path {
        return Device::with_path(path)
            .with_context(|| format!("Failed to open camera at {}", path.display()));
    }

    if let Ok(dev) = Device::new(config.device_id as usize)
        && dev.query_caps().is_ok()
    {
        return Ok(dev);
    }

    tracing::debug!(
        index = config.device_id,
        "Camera index busy or missing, scanning alternatives"
    );

    let best_idx = find_usable_camera().ok_or_else(|| anyhow!("No usable video devices found"))?;
    Device::new(best_idx as usize).context("Failed to open fallback camera device")
}

/// YUYV first (no decode needed before JPEG encoding), MJPEG otherwise.
fn select_format(device: &Device) -> Result<PixelFormat> {
    let formats = device.enum_formats()?;

    for fmt in &formats {
        tracing::debug!(fourcc = %fmt.fourcc, description = %fmt.description, "Available format");
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_YUYV) {
        return Ok(PixelFormat::Yuyv);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Ok(PixelFormat::Mjpeg);
    }

    Err(anyhow!(
        "Camera supports neither YUYV nor MJPEG - available: {:?}",
        formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
    ))
}

/// Portrait stills: let the camera pick exposure and keep focus continuous.
fn configure_for_portrait(device: &Device) {
    let controls = match device.query_controls() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to query camera controls");
            return;
        }
    };

    if controls.iter().any(|c| c.id == V4L2_CID_EXPOSURE_AUTO)
        && let Err(e) = device.set_control(Control {
            id: V4L2_CID_EXPOSURE_AUTO,
            value: Value::Integer(V4L2_EXPOSURE_AUTO),
        })
    {
        tracing::debug!(error = %e, "Auto exposure not supported");
    }

    if controls.iter().any(|c| c.id == V4L2_CID_FOCUS_AUTO)
        && let Err(e) = device.set_control(Control {
            id: V4L2_CID_FOCUS_AUTO,
            value: Value::Boolean(true),
        })
    {
        tracing::debug!(error = %e, "Continuous autofocus not supported");
    }
}

pub struct CameraDevice {
    pub device: Device,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl CameraDevice {
    pub fn open(config: &CameraConfig, retry: &RetryPolicy) -> Result<Self> {
        let device = retry.run(|| open_device(config), "Camera init")?;

        let caps = device.query_caps()?;
        tracing::info!(card = %caps.card, driver = %caps.driver, "Camera opened");

        let pixel_format = select_format(&device)?;
        let fourcc = match pixel_format {
            PixelFormat::Yuyv => FOURCC_YUYV,
            PixelFormat::Mjpeg => FOURCC_MJPG,
        };

        let mut format = device.format()?;
        format.fourcc = fourcc;
        let format = device.set_format(&format)?;

        tracing::info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            ?pixel_format,
            "Capture format"
        );

        configure_for_portrait(&device);

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            pixel_format,
        })
    }
}
