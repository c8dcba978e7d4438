pub mod chat;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod types;

pub use provider::ScoringOracle;
pub use registry::build_oracle;
pub use types::{DetectionRequest, OracleResponse};
