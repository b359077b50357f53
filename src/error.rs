//! Error types for the decision engine

use thiserror::Error;

/// Result type alias using [`EngineError`]
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures raised by collaborators or by invalid configuration.
///
/// Numeric edge cases (too little data, degenerate odds) are not errors and
/// never appear here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Upstream data access failure
    #[error("Data error: {0}")]
    Data(String),

    /// Feature provider has no row for a match
    #[error("Match not found: {0}")]
    MatchNotFound(String),

    /// CSV / dataframe failures
    #[error("Dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model fitting or inference failure
    #[error("Model error: {0}")]
    Model(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Validation helpers
pub fn validate_probability(name: &str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(EngineError::Config(format!(
            "{} must be between 0 and 1, got {}",
            name, p
        )));
    }
    Ok(())
}

pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(EngineError::Config(format!(
            "{} must be a positive number, got {}",
            name, value
        )));
    }
    Ok(())
}
