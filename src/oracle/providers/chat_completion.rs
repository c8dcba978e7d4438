use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{DartSightError, DartSightResult};
use crate::oracle::chat::{ChatMessage, ContentPart};
use crate::oracle::provider::ScoringOracle;
use crate::oracle::types::{DetectionRequest, OracleResponse};
use crate::scoring::parser::{first_score_in_text, normalize_score, parse_dart_pairs};

pub const SCORING_PROMPT: &str = "\
You are a darts scoring agent. Analyze the dartboard image and identify ALL darts currently on the board.

PROCESS:
1. Identify all darts visible on the dartboard
2. For each dart, determine its exact position on the board
3. Calculate the score for each dart

SCORING RULES:
- Inner bullseye (red center): 50 points
- Outer bullseye (green ring): 25 points
- Triple ring (inner thin ring): 3x the segment number
- Double ring (outer thin ring): 2x the segment number
- Single segments: Face value (1-20)
- Outside scoring area: 0 points

OUTPUT FORMAT:
List each dart on its own line:
Dart 1: [score]
Dart 2: [score]
Dart 3: [score]

If no darts are present:
Dart 1: 0";

const QUESTION: &str =
    "What score did the newly thrown darts achieve? Answer only in the output format.";

/// Queries an OpenAI-compatible chat completions endpoint directly and
/// turns the model's text into a legacy-shaped reply.
pub struct ChatCompletionOracle {
    id: String,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl ChatCompletionOracle {
    pub fn new(
        api_base: String,
        api_key: String,
        model: String,
        temperature: f64,
        max_tokens: u32,
        timeout: Duration,
    ) -> DartSightResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: "chat_completions".to_string(),
            api_base,
            api_key,
            model,
            temperature,
            max_tokens,
            client,
        })
    }
}

#[async_trait]
impl ScoringOracle for ChatCompletionOracle {
    fn name(&self) -> &str {
        &self.id
    }

    async fn detect(&self, request: DetectionRequest) -> DartSightResult<OracleResponse> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let messages = build_messages(&request);
        let body = serde_json::json!({
            "model": model,
            "messages": &messages,
            "stream": false,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        tracing::debug!(oracle = %self.id, model = %model, "calling scoring model");
        tracing::trace!(body = %sanitized_body(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DartSightError::OracleCallFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DartSightError::OracleCallFailed(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "model reply is not JSON");
                return Ok(OracleResponse::Malformed { raw: String::new() });
            }
        };
        let Some(text) = extract_reply_text(&json) else {
            return Ok(OracleResponse::Malformed { raw: json.to_string() });
        };
        tracing::info!(oracle = %self.id, raw = %text, "model reply received");
        Ok(response_from_text(text))
    }
}

pub fn build_messages(request: &DetectionRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SCORING_PROMPT),
        ChatMessage::user_parts(vec![
            ContentPart::text(format!(
                "BEFORE image (timestamp: {:.2}s):",
                request.before_timestamp
            )),
            ContentPart::jpeg_base64(&request.before_image),
            ContentPart::text(format!(
                "AFTER image (timestamp: {:.2}s):",
                request.after_timestamp
            )),
            ContentPart::jpeg_base64(&request.after_image),
            ContentPart::text(QUESTION),
        ]),
    ]
}

/// `choices[0].message.content` as a string or a list of text parts,
/// else `choices[0].text`.
pub fn extract_reply_text(json: &serde_json::Value) -> Option<String> {
    let choice = &json["choices"][0];
    let content = &choice["message"]["content"];
    if let Some(s) = content.as_str() {
        return Some(s.to_string());
    }
    if let Some(parts) = content.as_array() {
        let joined: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if !joined.is_empty() {
            return Some(joined.join(""));
        }
    }
    choice["text"].as_str().map(str::to_string)
}

/// Score is the sum of the listed darts, or the first integer when the
/// model ignored the output format. A total above the maximum scores 0.
pub fn response_from_text(text: String) -> OracleResponse {
    let pairs = parse_dart_pairs(&text);
    let score = if pairs.is_empty() {
        first_score_in_text(&text)
    } else {
        normalize_score(pairs.iter().map(|d| i64::from(d.score)).sum())
    };
    let confidence = if score > 0 { 0.95 } else { 0.5 };
    OracleResponse::Legacy {
        score: score as i64,
        confidence,
        raw_response: text,
    }
}

fn sanitized_body(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DetectionRequest {
        DetectionRequest {
            before_image: "QkVGT1JF".into(),
            after_image: "QUZURVI=".into(),
            before_timestamp: 3.0,
            after_timestamp: 4.256,
            model: None,
        }
    }

    #[test]
    fn messages_interleave_labels_and_images() {
        let messages = build_messages(&request());
        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["role"], "system");
        let parts = json[1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0]["text"], "BEFORE image (timestamp: 3.00s):");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QkVGT1JF");
        assert_eq!(parts[2]["text"], "AFTER image (timestamp: 4.26s):");
        assert_eq!(parts[3]["type"], "image_url");
    }

    #[test]
    fn sanitized_body_hides_images() {
        let body = serde_json::json!({ "messages": build_messages(&request()) });
        let logged = sanitized_body(&body);
        assert!(!logged.contains("QkVGT1JF"));
        assert!(logged.contains("<omitted_base64_image>"));
    }

    #[test]
    fn extracts_string_and_part_contents() {
        let plain = serde_json::json!({"choices":[{"message":{"content":"Dart 1: 20"}}]});
        assert_eq!(extract_reply_text(&plain).as_deref(), Some("Dart 1: 20"));

        let parts = serde_json::json!({"choices":[{"message":{"content":[
            {"type":"text","text":"Dart 1: "},{"type":"text","text":"5"}
        ]}}]});
        assert_eq!(extract_reply_text(&parts).as_deref(), Some("Dart 1: 5"));

        let legacy = serde_json::json!({"choices":[{"text":"17"}]});
        assert_eq!(extract_reply_text(&legacy).as_deref(), Some("17"));

        assert!(extract_reply_text(&serde_json::json!({"error":"x"})).is_none());
    }

    #[test]
    fn reply_text_becomes_legacy_response() {
        let resp = response_from_text("Dart 1: 20, Dart 2: 60".into());
        assert_eq!(
            resp,
            OracleResponse::Legacy {
                score: 80,
                confidence: 0.95,
                raw_response: "Dart 1: 20, Dart 2: 60".into()
            }
        );

        match response_from_text("nothing new".into()) {
            OracleResponse::Legacy { score, confidence, .. } => {
                assert_eq!(score, 0);
                assert_eq!(confidence, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn total_above_maximum_scores_zero_with_low_confidence() {
        match response_from_text("Dart 1: 60, Dart 2: 60, Dart 3: 60, Dart 4: 20".into()) {
            OracleResponse::Legacy { score, confidence, .. } => {
                assert_eq!(score, 0);
                assert_eq!(confidence, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }

        match response_from_text("Dart 1: 60, Dart 2: 60, Dart 3: 60".into()) {
            OracleResponse::Legacy { score, confidence, .. } => {
                assert_eq!(score, 180);
                assert_eq!(confidence, 0.95);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn oracle(url: String) -> ChatCompletionOracle {
        ChatCompletionOracle::new(
            url,
            "secret".into(),
            "vision-model".into(),
            0.3,
            64,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn chat_reply_is_scored_from_its_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "vision-model",
                "stream": false,
                "max_tokens": 64,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Dart 1: 20\nDart 2: 60"}}]}"#)
            .create_async()
            .await;

        let reply = oracle(format!("{}/v1/chat/completions", server.url()))
            .detect(request())
            .await
            .unwrap();

        mock.assert_async().await;
        match reply {
            OracleResponse::Legacy { score, confidence, .. } => {
                assert_eq!(score, 80);
                assert_eq!(confidence, 0.95);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_error_status_becomes_call_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = oracle(format!("{}/v1/chat/completions", server.url()))
            .detect(request())
            .await
            .unwrap_err();
        assert!(matches!(err, DartSightError::OracleCallFailed(m) if m.contains("429")));
    }
}
