use std::sync::Mutex;
use std::time::Instant;

use image::RgbaImage;

use crate::errors::{DartSightError, DartSightResult};
use crate::perception::traits::VideoSource;

/// Reads the dartboard stream from a monitor it is displayed on.
///
/// Monitors are re-enumerated on every render since `xcap` handles are not
/// guaranteed to be `Send` on every platform.
pub struct MonitorSource {
    /// `None` picks the primary monitor.
    index: Option<usize>,
    opened_at: Instant,
    size: Mutex<Option<(u32, u32)>>,
}

impl MonitorSource {
    pub fn open(index: Option<usize>) -> DartSightResult<Self> {
        let monitor = select_monitor(index)?;
        let size = (monitor.width(), monitor.height());
        tracing::info!(?index, width = size.0, height = size.1, "monitor source opened");
        Ok(Self {
            index,
            opened_at: Instant::now(),
            size: Mutex::new(Some(size)),
        })
    }
}

fn select_monitor(index: Option<usize>) -> DartSightResult<xcap::Monitor> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| DartSightError::CaptureUnavailable(format!("enumerate monitors: {e}")))?;
    let picked = match index {
        Some(i) => monitors.into_iter().nth(i),
        None => {
            let mut fallback = None;
            let mut primary = None;
            for m in monitors {
                if m.is_primary() {
                    primary = Some(m);
                    break;
                }
                if fallback.is_none() {
                    fallback = Some(m);
                }
            }
            primary.or(fallback)
        }
    };
    picked.ok_or_else(|| DartSightError::CaptureUnavailable("no monitor found".into()))
}

impl VideoSource for MonitorSource {
    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        self.size.lock().ok().and_then(|s| *s)
    }

    fn playback_position(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64()
    }

    fn render(&self, _width: u32, _height: u32) -> Option<RgbaImage> {
        let monitor = match select_monitor(self.index) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "monitor not available");
                return None;
            }
        };
        let captured = match monitor.capture_image() {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!(error = %e, "monitor capture failed");
                return None;
            }
        };
        let (w, h) = (captured.width(), captured.height());
        if let Ok(mut size) = self.size.lock() {
            *size = Some((w, h));
        }
        // Rebuild through raw bytes so xcap's `image` version does not leak into ours.
        RgbaImage::from_raw(w, h, captured.into_raw())
    }
}
