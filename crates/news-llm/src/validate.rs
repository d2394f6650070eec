//! Parse + schema-validate a provider's raw text against `AnalysisResult`
//! (§3). Mirrors the reference's strict, extra-forbidding pydantic model:
//! exactly the four named keys, no extras, each individually constrained.

use news_schemas::{AnalysisResult, Sentiment};
use serde_json::Value;

const ALLOWED_KEYS: [&str; 4] = ["tickers", "sentiment", "confidence", "reasoning_summary"];

/// Parse `text` as JSON, then validate the object against the schema.
/// Returns the validated result plus the parsed JSON (the JSON is kept for
/// the audit trail even when validation later fails elsewhere).
pub fn parse_and_validate(text: &str) -> Result<(AnalysisResult, Value), String> {
    let payload: Value = serde_json::from_str(text).map_err(|e| format!("invalid json: {e}"))?;
    let obj = payload.as_object().ok_or_else(|| "JSON root must be an object".to_string())?;

    if let Some(extra) = obj.keys().find(|k| !ALLOWED_KEYS.contains(&k.as_str())) {
        return Err(format!("unexpected key in response: {extra}"));
    }

    let tickers_raw = obj
        .get("tickers")
        .and_then(Value::as_array)
        .ok_or_else(|| "tickers must be a list of strings".to_string())?;

    let mut tickers = Vec::with_capacity(tickers_raw.len());
    let mut seen = std::collections::HashSet::new();
    for v in tickers_raw {
        let s = v.as_str().ok_or_else(|| "tickers must be strings".to_string())?;
        let cleaned = s.trim().to_ascii_uppercase();
        if cleaned.is_empty() {
            return Err("tickers must be non-empty".to_string());
        }
        if seen.insert(cleaned.clone()) {
            tickers.push(cleaned);
        }
    }

    let sentiment_str = obj
        .get("sentiment")
        .and_then(Value::as_str)
        .ok_or_else(|| "sentiment must be a string".to_string())?;
    let sentiment = Sentiment::parse(sentiment_str)
        .ok_or_else(|| "sentiment must be positive|neutral|negative".to_string())?;

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| "confidence must be a number".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err("confidence must be between 0 and 1".to_string());
    }

    let summary_raw = obj
        .get("reasoning_summary")
        .and_then(Value::as_str)
        .ok_or_else(|| "reasoning_summary must be a string".to_string())?;
    let summary = summary_raw.trim().to_string();
    if summary.is_empty() {
        return Err("reasoning_summary must be non-empty".to_string());
    }
    if summary.chars().count() > 280 {
        return Err("reasoning_summary must be <= 280 chars".to_string());
    }

    Ok((
        AnalysisResult {
            tickers,
            sentiment,
            confidence,
            reasoning_summary: summary,
        },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_confidence_boundaries() {
        let good = r#"{"tickers":["aapl"],"sentiment":"positive","confidence":1.0,"reasoning_summary":"ok"}"#;
        assert!(parse_and_validate(good).is_ok());
        let good0 = r#"{"tickers":["aapl"],"sentiment":"positive","confidence":0.0,"reasoning_summary":"ok"}"#;
        assert!(parse_and_validate(good0).is_ok());
    }

    #[test]
    fn rejects_confidence_over_one() {
        let bad = r#"{"tickers":["aapl"],"sentiment":"positive","confidence":1.0000001,"reasoning_summary":"ok"}"#;
        assert!(parse_and_validate(bad).is_err());
    }

    #[test]
    fn rejects_whitespace_only_summary() {
        let bad = r#"{"tickers":["aapl"],"sentiment":"positive","confidence":0.5,"reasoning_summary":"   "}"#;
        assert!(parse_and_validate(bad).is_err());
    }

    #[test]
    fn accepts_exactly_280_chars_rejects_281() {
        let ok_summary = "a".repeat(280);
        let too_long = "a".repeat(281);
        let ok = format!(
            r#"{{"tickers":["aapl"],"sentiment":"positive","confidence":0.5,"reasoning_summary":"{ok_summary}"}}"#
        );
        let bad = format!(
            r#"{{"tickers":["aapl"],"sentiment":"positive","confidence":0.5,"reasoning_summary":"{too_long}"}}"#
        );
        assert!(parse_and_validate(&ok).is_ok());
        assert!(parse_and_validate(&bad).is_err());
    }

    #[test]
    fn dedups_tickers_preserving_order_and_uppercases() {
        let text = r#"{"tickers":["aapl","MSFT","aapl"],"sentiment":"neutral","confidence":0.5,"reasoning_summary":"ok"}"#;
        let (result, _) = parse_and_validate(text).unwrap();
        assert_eq!(result.tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_and_validate("not-json").is_err());
    }
}
