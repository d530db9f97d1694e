use thiserror::Error;

/// Errors raised at the engine's parse/serialize boundaries.
///
/// Analytical operations never fail; only config parsing, payload parsing
/// and export produce these.
#[derive(Error, Debug)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config value out of range.
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// JSON payload could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// CSV writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Export buffer was not valid UTF-8.
    #[error("encoding error: {0}")]
    Utf8(String),
}
