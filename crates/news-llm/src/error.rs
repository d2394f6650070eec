//! C9/C10 typed errors, replacing the reference's thrown-exception control
//! flow with explicit result variants (§9 "Exception-driven control flow →
//! result types").

use thiserror::Error;

/// A failure surfaced by a provider adapter (C10). `code` carries the
/// upstream-reported error code, if any, so C9 can classify it without
/// string-matching the display message.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("provider config error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider http error (status {status}): {body}")]
    Http { status: u16, body: String },
    #[error("provider returned no usable content")]
    EmptyResponse,
    #[error("insufficient_quota: {0}")]
    InsufficientQuota(String),
}

impl ProviderError {
    /// The upstream-reported error code, when the provider surfaced one.
    /// C9's non-retryable check is `code() == Some("insufficient_quota")`.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ProviderError::InsufficientQuota(_) => Some("insufficient_quota"),
            _ => None,
        }
    }
}

/// A single attempt's audit record, appended to the trail regardless of
/// outcome (§4.9 step 5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub prompt: String,
    pub output_text: Option<String>,
    pub output_json: Option<serde_json::Value>,
    pub raw_response: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// The domain failure carrying the full audit trail (§4.9 step 6), raised
/// when no attempt in the retry budget succeeded.
#[derive(Debug)]
pub struct AnalysisError {
    pub attempts: Vec<AttemptRecord>,
}

impl AnalysisError {
    pub fn last_error(&self) -> String {
        self.attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "analysis failed after {} attempt(s): {}",
            self.attempts.len(),
            self.last_error()
        )
    }
}

impl std::error::Error for AnalysisError {}
