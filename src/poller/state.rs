use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::config::PollerConfig;
use crate::perception::Frame;
use crate::poller::loop_control::InvocationThrottle;
use crate::scoring::{DartScore, DetectionResult, HistoryEntry, ScoreHistory};

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub period: Duration,
    pub min_spacing: Duration,
    pub max_displayed_darts: usize,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}

impl PollerSettings {
    pub fn from_config(cfg: &PollerConfig) -> Self {
        Self {
            period: Duration::from_millis(cfg.period_ms.max(1)),
            min_spacing: Duration::from_millis(cfg.min_spacing_ms),
            max_displayed_darts: cfg.max_displayed_darts.max(1),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Loop is disabled.
    Inactive,
    /// Another tick body is still running.
    Busy,
    /// Less than the minimum spacing since the last invocation.
    Throttled,
    CaptureUnavailable,
    /// No reference frame existed; the capture became the reference.
    Seeded,
    Scored { primary: u32 },
    OracleFailed { message: String },
    /// The loop was disabled while the tick was running; its result was dropped.
    Discarded,
}

/// Live result shown to the player.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub current: Option<DetectionResult>,
    pub last_error: Option<String>,
}

/// Mutable state of one loop instance.
pub struct LoopState {
    pub active: bool,
    /// Bumped on every enable/disable; stale tick bodies compare against it.
    pub generation: u64,
    pub busy: bool,
    pub throttle: InvocationThrottle,
    pub reference: Option<Frame>,
    pub display: DisplayState,
    pub history: ScoreHistory,
}

impl LoopState {
    pub fn new(settings: &PollerSettings, history: ScoreHistory) -> Self {
        Self {
            active: false,
            generation: 0,
            busy: false,
            throttle: InvocationThrottle::new(settings.min_spacing),
            reference: None,
            display: DisplayState::default(),
            history,
        }
    }

    /// Clears the per-session state. Display and history are kept.
    pub fn tear_down(&mut self) {
        self.active = false;
        self.generation += 1;
        self.throttle.reset();
        self.reference = None;
    }

    /// Updates the display and returns the history entry a hit produced.
    pub fn apply(&mut self, result: &DetectionResult) -> Option<HistoryEntry> {
        self.display.current = Some(result.clone());
        self.display.last_error = None;
        if !result.is_hit() {
            return None;
        }
        let entry = HistoryEntry::now(result.primary, result.confidence);
        self.history.push(entry.clone());
        Some(entry)
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        let current = self.display.current.as_ref();
        ScoreSnapshot {
            active: self.active,
            score: current.map(|r| r.primary),
            confidence: current.map(|r| r.confidence),
            darts: current.map(|r| r.darts.clone()).unwrap_or_default(),
            last_error: self.display.last_error.clone(),
            history: self.history.recent(),
            has_reference: self.reference.is_some(),
        }
    }
}

/// Read-only view of the loop for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub active: bool,
    pub score: Option<u32>,
    pub confidence: Option<f32>,
    pub darts: Vec<DartScore>,
    pub last_error: Option<String>,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    pub has_reference: bool,
}
