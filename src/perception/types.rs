use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A captured, JPEG-encoded picture of the dartboard.
///
/// Cloning is cheap: the encoded bytes are shared.
#[derive(Debug, Clone)]
pub struct Frame {
    bytes: Arc<[u8]>,
    meta: FrameMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Playback position of the source in seconds (not wall-clock).
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Capture counter of the owning `FrameCapture`; never reset.
    pub sequence: u64,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, meta: FrameMeta) -> Self {
        Self {
            bytes: bytes.into(),
            meta,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    pub fn timestamp(&self) -> f64 {
        self.meta.timestamp
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}
