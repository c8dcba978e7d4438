use thiserror::Error;

#[derive(Debug, Error)]
pub enum DartSightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Oracle call failed: {0}")]
    OracleCallFailed(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Poller error: {0}")]
    Poller(String),
}

impl serde::Serialize for DartSightError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DartSightResult<T> = Result<T, DartSightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_serialize_as_display_string() {
        let err = DartSightError::OracleCallFailed("503 Service Unavailable".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Oracle call failed: 503 Service Unavailable\"");
    }
}
