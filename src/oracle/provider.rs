use async_trait::async_trait;

use crate::errors::DartSightResult;
use crate::oracle::types::{DetectionRequest, OracleResponse};

/// The external scoring service, treated as an opaque black box.
///
/// Transport failures surface as `Err`; a reply the client cannot make
/// sense of is `Ok(OracleResponse::Malformed { .. })`.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn detect(&self, request: DetectionRequest) -> DartSightResult<OracleResponse>;
}
