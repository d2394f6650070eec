//! Retry classification and backoff, §4.8 "Retry predicate" / lease
//! discipline. Grounded on the original's `LLMRunAttempt`/error-string
//! conventions from `app/llm/interface.py`, adapted into the worker's own
//! decision (the LLM layer never decides retryability itself).

use chrono::{DateTime, Utc};

const NON_RETRYABLE_TOKENS: [&str; 3] = ["insufficient_quota", "401", "403"];
const RETRYABLE_TOKENS: [&str; 3] = ["timeout", "json", "validation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Terminal,
}

/// Classify a job failure by substring match on the lowercased error
/// message. Non-retryable tokens are checked first; default is
/// non-retryable when neither set matches.
pub fn classify(error_message: &str) -> RetryDecision {
    let lower = error_message.to_ascii_lowercase();
    if NON_RETRYABLE_TOKENS.iter().any(|t| lower.contains(t)) {
        return RetryDecision::Terminal;
    }
    if RETRYABLE_TOKENS.iter().any(|t| lower.contains(t)) {
        return RetryDecision::Retry;
    }
    RetryDecision::Terminal
}

/// `now + 2^(attempts+1)` seconds, per §4.8.
pub fn next_run_after(now: DateTime<Utc>, attempts_before_this_failure: i32) -> DateTime<Utc> {
    let exponent = (attempts_before_this_failure + 1).clamp(0, 30) as u32;
    now + chrono::Duration::seconds(2i64.pow(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_and_auth_errors_are_terminal() {
        assert_eq!(classify("provider_error:insufficient_quota:over quota"), RetryDecision::Terminal);
        assert_eq!(classify("HTTP 401 Unauthorized"), RetryDecision::Terminal);
        assert_eq!(classify("forbidden (403)"), RetryDecision::Terminal);
    }

    #[test]
    fn timeout_json_and_validation_errors_are_retryable() {
        assert_eq!(classify("request timed out"), RetryDecision::Retry);
        assert_eq!(classify("invalid json: eof"), RetryDecision::Retry);
        assert_eq!(classify("validation failed: confidence out of range"), RetryDecision::Retry);
    }

    #[test]
    fn unrecognized_errors_default_to_terminal() {
        assert_eq!(classify("something unexpected exploded"), RetryDecision::Terminal);
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(classify("TIMEOUT waiting for upstream"), RetryDecision::Retry);
    }

    #[test]
    fn backoff_grows_exponentially_with_attempts() {
        let now: DateTime<Utc> = "2026-01-15T00:00:00Z".parse().unwrap();
        let first = next_run_after(now, 0);
        let second = next_run_after(now, 1);
        assert_eq!((first - now).num_seconds(), 2);
        assert_eq!((second - now).num_seconds(), 4);
    }
}
