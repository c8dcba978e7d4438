use serde::{Deserialize, Serialize};

/// Highest score the oracle may report for one detection.
pub const MAX_SCORE: u32 = 180;

/// One dart as shown to the player: 1-based index and its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DartScore {
    pub index: u32,
    pub score: u32,
}

impl DartScore {
    pub fn new(index: u32, score: u32) -> Self {
        Self { index, score }
    }
}

/// The outcome of one oracle call, after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Every score the oracle reported, range-checked.
    pub scores: Vec<u32>,
    /// Pairs resolved for display.
    pub darts: Vec<DartScore>,
    /// Score that drives the live display and the history buffer.
    pub primary: u32,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub raw_text: String,
}

impl DetectionResult {
    pub fn empty(raw_text: String) -> Self {
        Self {
            scores: Vec::new(),
            darts: Vec::new(),
            primary: 0,
            confidence: 0.0,
            raw_text,
        }
    }

    /// A score of zero means "no new dart".
    pub fn is_hit(&self) -> bool {
        self.primary > 0
    }
}
