//! Error types shared across the dashboard.
//!
//! Library modules return these `thiserror` enums; the binary wraps them in
//! `anyhow` at the command boundary.

use thiserror::Error;

/// Failure talking to one of the trading-bot REST APIs.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("API request failed: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON from upstream: {0}")]
    Decode(String),
}

/// Failure turning upstream payloads into a dashboard snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Unexpected upstream shape: {0}")]
    UnexpectedShape(String),
}

impl SnapshotError {
    pub fn overflow(what: &str) -> Self {
        SnapshotError::UnexpectedShape(format!("{} exceeds the decimal range", what))
    }
}

/// Failure producing a profit forecast.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid history: {0}")]
    InvalidHistory(String),

    #[error("Language model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Language model API error: {0}")]
    Api(String),

    #[error("Forecast does not match schema: {0}")]
    SchemaViolation(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SchemaViolation(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid model specified: {0}")]
pub struct ModelParseError(pub String);
