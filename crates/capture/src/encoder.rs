use anyhow::{Context, Result};
use common::span;
use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};

/// Turns one raw camera buffer into a JPEG still.
pub trait FrameEncoder: Send {
    fn encode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>>;
}

/// YUYV (YUV 4:2:2) to RGB, then baseline JPEG.
///
/// YUYV packs 2 pixels in 4 bytes: [Y0, U, Y1, V]
pub struct YuyvEncoder {
    quality: u8,
    rgb_buffer: Vec<u8>,
}

impl YuyvEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            rgb_buffer: Vec::new(),
        }
    }

    fn convert_rgb(&mut self, raw: &[u8], width: u32, height: u32) -> Result<&[u8]> {
        let rgb_size = (width * height) as usize * 3;
        let bytes_per_row = (width * 2) as usize;
        anyhow::ensure!(
            height > 0 && raw.len() >= bytes_per_row * height as usize,
            "YUYV buffer too short: {} bytes for {}x{}",
            raw.len(),
            width,
            height
        );
        self.rgb_buffer.resize(rgb_size, 0);

        let stride = raw.len() / height as usize;
        let mut out_idx = 0;
        for row in 0..height as usize {
            let row_start = row * stride;
            let row_data = &raw[row_start..row_start + bytes_per_row];

            for chunk in row_data.chunks_exact(4) {
                let y0 = chunk[0] as i32;
                let u = chunk[1] as i32 - 128;
                let y1 = chunk[2] as i32;
                let v = chunk[3] as i32 - 128;

                // BT.601 fixed-point coefficients (8-bit fraction)
                let rv = (359 * v) >> 8;
                let gu = (88 * u + 183 * v) >> 8;
                let bu = (454 * u) >> 8;

                for y in [y0, y1] {
                    self.rgb_buffer[out_idx] = (y + rv).clamp(0, 255) as u8;
                    self.rgb_buffer[out_idx + 1] = (y - gu).clamp(0, 255) as u8;
                    self.rgb_buffer[out_idx + 2] = (y + bu).clamp(0, 255) as u8;
                    out_idx += 3;
                }
            }
        }

        Ok(&self.rgb_buffer[..rgb_size])
    }
}

impl FrameEncoder for YuyvEncoder {
    fn encode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        let _s = span!("encode");
        let quality = self.quality;
        let rgb = self.convert_rgb(raw, width, height)?;
        encode_rgb(rgb, width, height, quality)
    }
}

/// MJPEG buffers are already JPEG; they are checked and passed through.
pub struct MjpegPassthrough {
    decompressor: turbojpeg::Decompressor,
}

impl MjpegPassthrough {
    pub fn new() -> Result<Self> {
        Ok(Self {
            decompressor: turbojpeg::Decompressor::new()
                .context("Failed to create JPEG decompressor")?,
        })
    }
}

impl FrameEncoder for MjpegPassthrough {
    fn encode(&mut self, raw: &[u8], _width: u32, _height: u32) -> Result<Vec<u8>> {
        let _s = span!("encode");
        // Some UVC cameras hand out truncated buffers while settling.
        let header = self
            .decompressor
            .read_header(raw)
            .context("Corrupt MJPEG frame")?;
        tracing::trace!(width = header.width, height = header.height, "MJPEG frame");
        Ok(raw.to_vec())
    }
}

pub fn encode_rgb(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .write_image(rgb, width, height, ExtendedColorType::Rgb8)
        .context("JPEG encoding failed")?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_jpeg(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0xFF, 0xD8]) && bytes.ends_with(&[0xFF, 0xD9])
    }

    #[test]
    fn yuyv_neutral_chroma_is_gray() {
        let mut encoder = YuyvEncoder::new(85);
        let rgb = encoder.convert_rgb(&[128, 128, 128, 128], 2, 1).unwrap();
        assert_eq!(rgb, &[128, 128, 128, 128, 128, 128]);
    }

    #[test]
    fn yuyv_encodes_jpeg() {
        let mut encoder = YuyvEncoder::new(85);
        let yuyv = vec![128u8; 16 * 16 * 2];
        let jpeg = encoder.encode(&yuyv, 16, 16).unwrap();
        assert!(is_jpeg(&jpeg));
    }

    #[test]
    fn yuyv_rejects_short_buffer() {
        let mut encoder = YuyvEncoder::new(85);
        assert!(encoder.encode(&[0; 10], 16, 16).is_err());
    }

    #[test]
    fn mjpeg_passes_valid_frames_through() {
        let jpeg = encode_rgb(&[200u8; 8 * 8 * 3], 8, 8, 90).unwrap();
        let mut passthrough = MjpegPassthrough::new().unwrap();
        assert_eq!(passthrough.encode(&jpeg, 8, 8).unwrap(), jpeg);
    }

    #[test]
    fn mjpeg_rejects_invalid_data() {
        let mut passthrough = MjpegPassthrough::new().unwrap();
        assert!(passthrough.encode(&[0, 1, 2, 3], 640, 480).is_err());
    }
}
