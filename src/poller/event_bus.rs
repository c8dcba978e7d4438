use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::scoring::DetectionResult;

/// Notifications a view layer binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollerEvent {
    Enabled,
    Disabled,
    /// First frame of a session stored as reference, no oracle call made.
    Seeded { timestamp: f64 },
    ScoreUpdated { result: DetectionResult },
    /// Transient notice; the previous score stays on display.
    DetectionFailed { message: String },
}

pub struct EventBus {
    tx: broadcast::Sender<PollerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.tx.subscribe()
    }

    /// Events published with no subscriber are dropped.
    pub fn publish(&self, event: PollerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
