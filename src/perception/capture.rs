use std::sync::atomic::{AtomicU64, Ordering};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

use crate::config::CaptureConfig;
use crate::errors::DartSightResult;
use crate::perception::traits::VideoSource;
use crate::perception::types::{Frame, FrameMeta};

/// Renders a video source into an offscreen buffer and encodes it as JPEG.
pub struct FrameCapture {
    default_size: (u32, u32),
    quality: u8,
    sequence: AtomicU64,
}

impl FrameCapture {
    pub fn new(default_size: (u32, u32), quality: u8) -> Self {
        Self {
            default_size,
            quality: quality.clamp(1, 100),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn from_config(cfg: &CaptureConfig) -> Self {
        Self::new((cfg.default_width, cfg.default_height), cfg.jpeg_quality)
    }

    /// Capture the source's current picture.
    ///
    /// Returns `None` whenever the source or the render target is not ready.
    pub fn capture(&self, source: &dyn VideoSource) -> Option<Frame> {
        let (width, height) = source
            .intrinsic_size()
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or(self.default_size);
        if width == 0 || height == 0 {
            return None;
        }

        let timestamp = source.playback_position();
        let mut buffer = source.render(width, height)?;
        if buffer.dimensions() != (width, height) {
            buffer = image::imageops::resize(
                &buffer,
                width,
                height,
                image::imageops::FilterType::Triangle,
            );
        }

        let bytes = match encode_jpeg(buffer, self.quality) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "frame encode failed, skipping capture");
                return None;
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(sequence, timestamp, width, height, len = bytes.len(), "frame captured");
        Some(Frame::new(
            bytes,
            FrameMeta {
                timestamp,
                width,
                height,
                sequence,
            },
        ))
    }
}

impl Default for FrameCapture {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

/// JPEG has no alpha channel, so the buffer is flattened to RGB first.
pub fn encode_jpeg(buffer: RgbaImage, quality: u8) -> DartSightResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(buffer).to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&rgb)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeSource {
        size: Option<(u32, u32)>,
        position: f64,
        ready: bool,
        /// Size the source actually renders, to exercise the resize path.
        render_size: Option<(u32, u32)>,
        requested: Mutex<Vec<(u32, u32)>>,
    }

    impl FakeSource {
        fn ready(size: Option<(u32, u32)>) -> Self {
            Self {
                size,
                position: 12.5,
                ready: true,
                render_size: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl VideoSource for FakeSource {
        fn intrinsic_size(&self) -> Option<(u32, u32)> {
            self.size
        }

        fn playback_position(&self) -> f64 {
            self.position
        }

        fn render(&self, width: u32, height: u32) -> Option<RgbaImage> {
            self.requested.lock().unwrap().push((width, height));
            if !self.ready {
                return None;
            }
            let (w, h) = self.render_size.unwrap_or((width, height));
            Some(RgbaImage::from_pixel(w, h, image::Rgba([200, 30, 30, 255])))
        }
    }

    #[test]
    fn falls_back_to_default_size() {
        let source = FakeSource::ready(None);
        let frame = FrameCapture::default().capture(&source).unwrap();
        assert_eq!(source.requested.lock().unwrap().as_slice(), &[(640, 480)]);
        assert_eq!((frame.meta().width, frame.meta().height), (640, 480));
        assert_eq!(frame.timestamp(), 12.5);
    }

    #[test]
    fn uses_intrinsic_size_and_encodes_jpeg() {
        let source = FakeSource::ready(Some((320, 240)));
        let frame = FrameCapture::default().capture(&source).unwrap();
        // JPEG SOI marker
        assert_eq!(&frame.bytes()[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(frame.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn resizes_mismatched_render() {
        let mut source = FakeSource::ready(Some((160, 120)));
        source.render_size = Some((80, 60));
        let frame = FrameCapture::default().capture(&source).unwrap();
        let decoded = image::load_from_memory(frame.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 120));
    }

    #[test]
    fn not_ready_source_yields_none() {
        let mut source = FakeSource::ready(Some((160, 120)));
        source.ready = false;
        assert!(FrameCapture::default().capture(&source).is_none());
    }

    #[test]
    fn sequence_increments_per_capture() {
        let source = FakeSource::ready(Some((16, 16)));
        let capture = FrameCapture::default();
        let a = capture.capture(&source).unwrap();
        let b = capture.capture(&source).unwrap();
        assert_eq!(a.meta().sequence + 1, b.meta().sequence);
        assert_eq!(a.meta().sequence, 0);
    }
}
