use std::sync::Arc;
use std::time::Duration;

use crate::config::{OracleConfig, OracleKind};
use crate::errors::{DartSightError, DartSightResult};
use crate::oracle::provider::ScoringOracle;
use crate::oracle::providers::{ChatCompletionOracle, DetectEndpointOracle};

/// Build the configured oracle client.
///
/// The API key is read from `DARTSIGHT_ORACLE_API_KEY`, falling back to
/// `oracle.api_key` in config.toml.
pub fn build_oracle(config: &OracleConfig) -> DartSightResult<Arc<dyn ScoringOracle>> {
    if config.api_base.trim().is_empty() {
        return Err(DartSightError::Config("oracle.api_base is empty".into()));
    }
    let api_key = config.resolve_api_key();
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));

    let oracle: Arc<dyn ScoringOracle> = match config.kind {
        OracleKind::DetectEndpoint => Arc::new(DetectEndpointOracle::new(
            config.api_base.clone(),
            api_key,
            Some(config.model.clone()).filter(|m| !m.is_empty()),
            timeout,
        )?),
        OracleKind::ChatCompletions => {
            if api_key.is_empty() {
                tracing::warn!("chat completions oracle configured without an API key");
            }
            Arc::new(ChatCompletionOracle::new(
                config.api_base.clone(),
                api_key,
                config.model.clone(),
                config.temperature,
                config.max_tokens,
                timeout,
            )?)
        }
    };

    tracing::info!(
        oracle = oracle.name(),
        api_base = %config.api_base,
        model = %config.model,
        "scoring oracle ready"
    );
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_each_kind() {
        let mut cfg = OracleConfig::default();
        assert_eq!(build_oracle(&cfg).unwrap().name(), "detect_endpoint");
        cfg.kind = OracleKind::ChatCompletions;
        assert_eq!(build_oracle(&cfg).unwrap().name(), "chat_completions");
    }

    #[test]
    fn empty_endpoint_is_a_config_error() {
        let cfg = OracleConfig {
            api_base: "  ".into(),
            ..OracleConfig::default()
        };
        assert!(matches!(build_oracle(&cfg), Err(DartSightError::Config(_))));
    }
}
