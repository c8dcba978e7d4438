use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{DartSightError, DartSightResult};
use crate::oracle::provider::ScoringOracle;
use crate::oracle::types::{DetectionRequest, OracleResponse};

/// Client for a hosted detect-score endpoint speaking the
/// `{before_image, after_image, ...}` request shape.
pub struct DetectEndpointOracle {
    id: String,
    endpoint: String,
    api_key: String,
    model: Option<String>,
    client: reqwest::Client,
}

impl DetectEndpointOracle {
    pub fn new(
        endpoint: String,
        api_key: String,
        model: Option<String>,
        timeout: Duration,
    ) -> DartSightResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: "detect_endpoint".to_string(),
            endpoint,
            api_key,
            model,
            client,
        })
    }
}

#[async_trait]
impl ScoringOracle for DetectEndpointOracle {
    fn name(&self) -> &str {
        &self.id
    }

    async fn detect(&self, mut request: DetectionRequest) -> DartSightResult<OracleResponse> {
        if request.model.is_none() {
            request.model = self.model.clone();
        }

        tracing::debug!(
            oracle = %self.id,
            endpoint = %self.endpoint,
            before_ts = request.before_timestamp,
            after_ts = request.after_timestamp,
            before_len = request.before_image.len(),
            after_len = request.after_image.len(),
            "sending detection request"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| DartSightError::OracleCallFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DartSightError::OracleCallFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(DartSightError::OracleCallFailed(format!("{}: {}", status, body)));
        }

        let parsed = OracleResponse::from_body(&body);
        tracing::debug!(oracle = %self.id, malformed = parsed.is_malformed(), "detection response received");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn request() -> DetectionRequest {
        DetectionRequest {
            before_image: "QkVGT1JF".into(),
            after_image: "QUZURVI=".into(),
            before_timestamp: 1.0,
            after_timestamp: 2.0,
            model: None,
        }
    }

    fn oracle(url: String, api_key: &str) -> DetectEndpointOracle {
        DetectEndpointOracle::new(
            url,
            api_key.to_string(),
            Some("vision-model".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_frames_and_decodes_scores() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "before_image": "QkVGT1JF",
                "after_image": "QUZURVI=",
                "model": "vision-model",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"scores":[20,60],"confidence":0.9}"#)
            .create_async()
            .await;

        let reply = oracle(format!("{}/detect", server.url()), "secret")
            .detect(request())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            reply,
            OracleResponse::Current {
                scores: vec![20, 60],
                confidence: 0.9
            }
        );
    }

    #[tokio::test]
    async fn error_status_becomes_call_failure() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .with_status(503)
            .with_body("model overloaded")
            .create_async()
            .await;

        let err = oracle(format!("{}/detect", server.url()), "")
            .detect(request())
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            DartSightError::OracleCallFailed(message) => {
                assert!(message.contains("503"));
                assert!(message.contains("model overloaded"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_body_is_malformed_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let reply = oracle(format!("{}/detect", server.url()), "")
            .detect(request())
            .await
            .unwrap();
        assert!(reply.is_malformed());
    }
}
