use crate::capture_dir::CaptureDir;
use crate::encoder::encode_rgb;
use anyhow::Context;
use controller::{AcquisitionError, FrameSource};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Renders a moving gradient per call. Lets the pipeline run end to end on a
/// machine without a camera.
pub struct SyntheticFrameSource {
    dir: CaptureDir,
    width: u32,
    height: u32,
    quality: u8,
    frame_no: u32,
}

impl SyntheticFrameSource {
    pub fn new(capture_root: &Path, width: u32, height: u32, quality: u8) -> anyhow::Result<Self> {
        let dir = CaptureDir::create(capture_root).with_context(|| {
            format!("Failed to create capture dir in {}", capture_root.display())
        })?;
        Ok(Self {
            dir,
            width,
            height,
            quality,
            frame_no: 0,
        })
    }

    pub fn capture_dir(&self) -> &Path {
        self.dir.path()
    }
}

fn render(frame_no: u32, width: u32, height: u32) -> RgbImage {
    let shift = frame_no.wrapping_mul(13);
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)).wrapping_add(shift) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 128])
    })
}

impl FrameSource for SyntheticFrameSource {
    async fn acquire_frame(&mut self) -> Result<PathBuf, AcquisitionError> {
        let path = self.dir.next_frame_path();
        let (frame_no, width, height, quality) =
            (self.frame_no, self.width, self.height, self.quality);
        self.frame_no = self.frame_no.wrapping_add(1);

        let jpeg = tokio::task::spawn_blocking(move || {
            let image = render(frame_no, width, height);
            encode_rgb(image.as_raw(), width, height, quality)
        })
        .await
        .map_err(|e| AcquisitionError::TaskFailed(e.to_string()))?
        .map_err(|e| AcquisitionError::Device(format!("{e:#}")))?;

        tokio::fs::write(&path, jpeg).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_distinct_jpeg_files() {
        let base = tempfile::tempdir().unwrap();
        let mut source = SyntheticFrameSource::new(base.path(), 32, 24, 80).unwrap();

        let first = source.acquire_frame().await.unwrap();
        let second = source.acquire_frame().await.unwrap();
        assert_ne!(first, second);

        for path in [&first, &second] {
            assert_eq!(path.parent(), Some(source.capture_dir()));
            let bytes = std::fs::read(path).unwrap();
            assert!(bytes.starts_with(&[0xFF, 0xD8]));
        }

        let decoded = image::open(&first).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn gradient_moves_between_frames() {
        assert_ne!(render(0, 16, 16), render(1, 16, 16));
    }
}
