use serde::{Deserialize, Serialize};

use crate::perception::Frame;

/// Body sent to the hosted scoring endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    /// Base64 JPEG.
    pub before_image: String,
    /// Base64 JPEG.
    pub after_image: String,
    pub before_timestamp: f64,
    pub after_timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DetectionRequest {
    pub fn from_frames(before: &Frame, after: &Frame, model: Option<String>) -> Self {
        Self {
            before_image: before.to_base64(),
            after_image: after.to_base64(),
            before_timestamp: before.timestamp(),
            after_timestamp: after.timestamp(),
            model,
        }
    }
}

/// Oracle reply, one variant per response format the service has shipped.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleResponse {
    /// `{ scores: [..], confidence }`
    Current { scores: Vec<i64>, confidence: f64 },
    /// `{ score, confidence, raw_response }`
    Legacy {
        score: i64,
        confidence: f64,
        raw_response: String,
    },
    /// Neither shape was present.
    Malformed { raw: String },
}

/// Wire shapes. `Current` is tried first so a body carrying both fields
/// resolves to the structured list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Current {
        scores: Vec<i64>,
        #[serde(default)]
        confidence: f64,
    },
    Legacy {
        score: i64,
        #[serde(default)]
        confidence: f64,
        #[serde(default)]
        raw_response: String,
    },
}

impl OracleResponse {
    pub fn from_json(value: serde_json::Value) -> Self {
        match serde_json::from_value::<WireResponse>(value.clone()) {
            Ok(WireResponse::Current { scores, confidence }) => {
                OracleResponse::Current { scores, confidence }
            }
            Ok(WireResponse::Legacy {
                score,
                confidence,
                raw_response,
            }) => OracleResponse::Legacy {
                score,
                confidence,
                raw_response,
            },
            Err(e) => {
                tracing::warn!(error = %e, "oracle response matches no known shape");
                OracleResponse::Malformed {
                    raw: value.to_string(),
                }
            }
        }
    }

    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => Self::from_json(value),
            Err(e) => {
                tracing::warn!(error = %e, "oracle response is not JSON");
                OracleResponse::Malformed {
                    raw: body.to_string(),
                }
            }
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, OracleResponse::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::FrameMeta;

    #[test]
    fn decodes_current_shape() {
        let resp = OracleResponse::from_body(r#"{"scores":[20,60,50],"confidence":0.9}"#);
        assert_eq!(
            resp,
            OracleResponse::Current {
                scores: vec![20, 60, 50],
                confidence: 0.9
            }
        );
    }

    #[test]
    fn decodes_legacy_shape() {
        let resp = OracleResponse::from_body(
            r#"{"score":45,"confidence":0.95,"raw_response":"Dart 1: 45"}"#,
        );
        assert_eq!(
            resp,
            OracleResponse::Legacy {
                score: 45,
                confidence: 0.95,
                raw_response: "Dart 1: 45".into()
            }
        );
    }

    #[test]
    fn structured_list_wins_when_both_present() {
        let resp = OracleResponse::from_body(r#"{"score":5,"scores":[1,2],"confidence":0.5}"#);
        assert!(matches!(resp, OracleResponse::Current { .. }));
    }

    #[test]
    fn unknown_shapes_are_malformed() {
        assert!(OracleResponse::from_body(r#"{"detail":"boom"}"#).is_malformed());
        assert!(OracleResponse::from_body("<html>").is_malformed());
    }

    #[test]
    fn request_carries_frame_timestamps() {
        let meta = |ts| FrameMeta {
            timestamp: ts,
            width: 2,
            height: 2,
            sequence: 0,
        };
        let before = Frame::new(vec![1, 2, 3], meta(1.0));
        let after = Frame::new(vec![4, 5, 6], meta(2.5));
        let req = DetectionRequest::from_frames(&before, &after, None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["before_image"], "AQID");
        assert_eq!(json["after_timestamp"], 2.5);
        assert!(json.get("model").is_none());
    }
}
