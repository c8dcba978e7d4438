pub mod engine;
pub mod event_bus;
pub mod loop_control;
pub mod state;

pub use engine::ScorePoller;
pub use event_bus::PollerEvent;
pub use state::{PollerSettings, ScoreSnapshot, TickOutcome};
