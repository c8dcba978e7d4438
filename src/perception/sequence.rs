use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbaImage;

use crate::errors::{DartSightError, DartSightResult};
use crate::perception::traits::VideoSource;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Replays a directory of still frames as if it were a video at `fps`.
///
/// Each render consumes one frame; once the sequence is exhausted the
/// source reports itself as not ready.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    fps: f64,
    cursor: Mutex<usize>,
    size: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> DartSightResult<Self> {
        if !(fps > 0.0) {
            return Err(DartSightError::Config(format!("invalid frame rate {fps}")));
        }
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(DartSightError::Config(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }

        let size = image::image_dimensions(&frames[0]).ok();
        tracing::info!(dir = %dir.display(), frames = frames.len(), fps, "image sequence opened");
        Ok(Self {
            frames,
            fps,
            cursor: Mutex::new(0),
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoSource for ImageSequenceSource {
    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn playback_position(&self) -> f64 {
        let cursor = self.cursor.lock().map(|c| *c).unwrap_or(0);
        cursor as f64 / self.fps
    }

    fn render(&self, _width: u32, _height: u32) -> Option<RgbaImage> {
        let mut cursor = self.cursor.lock().ok()?;
        let path = self.frames.get(*cursor)?;
        match image::open(path) {
            Ok(img) => {
                *cursor += 1;
                Some(img.to_rgba8())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable frame");
                *cursor += 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, image::Rgba([10, 120, 10, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn replays_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_002.png", 8, 6);
        write_frame(dir.path(), "frame_001.png", 8, 6);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = ImageSequenceSource::open(dir.path(), 2.0).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.intrinsic_size(), Some((8, 6)));

        assert_eq!(source.playback_position(), 0.0);
        assert!(source.render(8, 6).is_some());
        assert_eq!(source.playback_position(), 0.5);
        assert!(source.render(8, 6).is_some());
        assert!(source.render(8, 6).is_none());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequenceSource::open(dir.path(), 1.0).is_err());
    }
}
