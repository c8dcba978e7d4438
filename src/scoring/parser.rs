use std::sync::OnceLock;

use regex::Regex;

use crate::oracle::types::OracleResponse;
use crate::scoring::types::{DartScore, DetectionResult, MAX_SCORE};

fn dart_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bdart\s*#?\s*(\d+)\s*[:=\-]\s*(\d+)").expect("dart pair regex is valid")
    })
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("integer regex is valid"))
}

/// Out-of-range scores are reported as 0.
pub fn normalize_score(value: i64) -> u32 {
    if (0..=MAX_SCORE as i64).contains(&value) {
        value as u32
    } else {
        tracing::warn!(score = value, "score out of valid range, using 0");
        0
    }
}

fn normalize_confidence(value: f64) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}

/// Extract every `Dart <n>: <score>` pair from free-form model text.
pub fn parse_dart_pairs(text: &str) -> Vec<DartScore> {
    dart_pair_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let index = caps[1].parse::<u32>().ok()?;
            let score = caps[2].parse::<i64>().map(normalize_score).unwrap_or(0);
            Some(DartScore::new(index, score))
        })
        .collect()
}

/// First integer in the text, range-checked. Text without digits scores 0.
pub fn first_score_in_text(text: &str) -> u32 {
    match integer_re().find(text.trim()) {
        Some(m) => m.as_str().parse::<i64>().map(normalize_score).unwrap_or(0),
        None => {
            tracing::warn!(response = %text, "could not parse score from response");
            0
        }
    }
}

/// Turn an oracle reply into the pairs and totals shown to the player.
///
/// The structured list is preferred and capped at `max_darts` with
/// sequential indices. Legacy replies are parsed from their raw text under
/// the same cap, and fall back to a single `(1, score)` pair when the text
/// has no pairs.
pub fn resolve(response: &OracleResponse, max_darts: usize) -> DetectionResult {
    match response {
        OracleResponse::Current { scores, confidence } => {
            let scores: Vec<u32> = scores.iter().copied().map(normalize_score).collect();
            let darts: Vec<DartScore> = scores
                .iter()
                .take(max_darts)
                .enumerate()
                .map(|(i, s)| DartScore::new(i as u32 + 1, *s))
                .collect();
            let primary = darts.iter().map(|d| d.score).sum();
            let raw_text = darts
                .iter()
                .map(|d| format!("Dart {}: {}", d.index, d.score))
                .collect::<Vec<_>>()
                .join(", ");
            DetectionResult {
                scores,
                darts,
                primary,
                confidence: normalize_confidence(*confidence),
                raw_text,
            }
        }
        OracleResponse::Legacy {
            score,
            confidence,
            raw_response,
        } => {
            let primary = normalize_score(*score);
            let mut darts = parse_dart_pairs(raw_response);
            darts.truncate(max_darts);
            if darts.is_empty() {
                darts.push(DartScore::new(1, primary));
            }
            DetectionResult {
                scores: vec![primary],
                darts,
                primary,
                confidence: normalize_confidence(*confidence),
                raw_text: raw_response.clone(),
            }
        }
        OracleResponse::Malformed { raw } => DetectionResult::empty(raw.clone()),
    }
}
