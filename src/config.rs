use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{DartSightError, DartSightResult};

/// Environment variable that overrides `oracle.api_key`.
pub const API_KEY_ENV: &str = "DARTSIGHT_ORACLE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// Hosted detect-score endpoint returning `{score|scores, confidence}`.
    DetectEndpoint,
    /// OpenAI-compatible chat completions endpoint queried directly.
    ChatCompletions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_kind")]
    pub kind: OracleKind,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model identifier forwarded to the oracle.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Falls back to this when `DARTSIGHT_ORACLE_API_KEY` is unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: default_oracle_kind(),
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key: None,
        }
    }
}

impl OracleConfig {
    pub fn resolve_api_key(&self) -> String {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| self.api_key.clone().unwrap_or_default())
    }
}

fn default_oracle_kind() -> OracleKind {
    OracleKind::DetectEndpoint
}

fn default_api_base() -> String {
    "http://localhost:8000/detect".to_string()
}

fn default_model() -> String {
    "databricks-claude-sonnet-4-5".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    64
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Minimum time between two oracle invocations.
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
    #[serde(default = "default_max_displayed_darts")]
    pub max_displayed_darts: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            min_spacing_ms: default_min_spacing_ms(),
            max_displayed_darts: default_max_displayed_darts(),
        }
    }
}

fn default_period_ms() -> u64 {
    1000
}

fn default_min_spacing_ms() -> u64 {
    1000
}

fn default_max_displayed_darts() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Grab a monitor; `None` picks the primary one.
    Monitor { index: Option<usize> },
    /// Replay still frames from a directory.
    Sequence { dir: PathBuf, fps: f64 },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Monitor { index: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_width")]
    pub default_width: u32,
    #[serde(default = "default_height")]
    pub default_height: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_width: default_width(),
            default_height: default_height(),
            jpeg_quality: default_jpeg_quality(),
            source: SourceConfig::default(),
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_jpeg_quality() -> u8 {
    80
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    /// Append every entry to a JSONL session file.
    #[serde(default)]
    pub journal: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            journal: false,
        }
    }
}

fn default_history_capacity() -> usize {
    10
}

fn resolve_config_path() -> DartSightResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Loads `config.toml`, or defaults when no file is found.
pub fn load_config() -> DartSightResult<AppConfig> {
    let Some(path) = resolve_config_path()? else {
        tracing::info!("no config.toml found, using defaults");
        return Ok(AppConfig::default());
    };
    let config = load_config_from(&path)?;
    tracing::info!(path = %path.display(), oracle = ?config.oracle.kind, "config loaded");
    Ok(config)
}

pub fn load_config_from(path: &std::path::Path) -> DartSightResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> DartSightResult<()> {
        if self.poller.period_ms == 0 {
            return Err(DartSightError::Config("poller.period_ms must be > 0".into()));
        }
        if self.history.capacity == 0 {
            return Err(DartSightError::Config("history.capacity must be > 0".into()));
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(DartSightError::Config(format!(
                "capture.jpeg_quality must be within 1..=100, got {}",
                self.capture.jpeg_quality
            )));
        }
        if let SourceConfig::Sequence { fps, .. } = &self.capture.source {
            if !(*fps > 0.0) {
                return Err(DartSightError::Config("capture.source.fps must be > 0".into()));
            }
        }
        Ok(())
    }
}
