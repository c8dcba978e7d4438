pub mod history;
pub mod parser;
pub mod types;

pub use history::{HistoryEntry, Journal, ScoreHistory};
pub use types::{DartScore, DetectionResult};
