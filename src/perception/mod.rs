pub mod capture;
pub mod screenshot;
pub mod sequence;
pub mod traits;
pub mod types;

pub use capture::FrameCapture;
pub use traits::VideoSource;
pub use types::{Frame, FrameMeta};

use std::sync::Arc;

use crate::config::SourceConfig;
use crate::errors::DartSightResult;

/// Open the video source described by the capture config.
pub fn open_source(cfg: &SourceConfig) -> DartSightResult<Arc<dyn VideoSource>> {
    match cfg {
        SourceConfig::Monitor { index } => {
            Ok(Arc::new(screenshot::MonitorSource::open(*index)?))
        }
        SourceConfig::Sequence { dir, fps } => {
            Ok(Arc::new(sequence::ImageSequenceSource::open(dir, *fps)?))
        }
    }
}
