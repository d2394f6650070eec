//! C9 — single entry point `analyze(news_event_id)`. §4.9.

use crate::error::{AnalysisError, AttemptRecord, ProviderError};
use crate::prompt::{build_input_text, build_prompt, build_retry_prompt};
use crate::provider::{build_provider, ProviderAdapter};
use crate::validate::parse_and_validate;
use news_config::LlmConfig;
use news_schemas::AnalysisResult;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub enum AnalyzeOutcome {
    Succeeded { analysis_id: i64, result: AnalysisResult },
    Failed { analysis_id: i64, error_message: String },
    NotFound,
}

/// Run the full retry-with-reprompt loop for one event and persist the
/// outcome. Step numbers below refer to §4.9.
pub async fn analyze(pool: &PgPool, news_event_id: i64) -> anyhow::Result<AnalyzeOutcome> {
    analyze_with_provider_factory(pool, news_event_id, |cfg| build_provider(cfg)).await
}

/// Test seam: inject an arbitrary provider factory (e.g. one returning a
/// `FakeProvider`) instead of resolving from environment configuration.
pub async fn analyze_with_provider_factory(
    pool: &PgPool,
    news_event_id: i64,
    provider_factory: impl FnOnce(&LlmConfig) -> Result<Box<dyn ProviderAdapter>, ProviderError>,
) -> anyhow::Result<AnalyzeOutcome> {
    let trace_id = Uuid::new_v4();

    let Some(event) = news_db::fetch_news_event(pool, news_event_id).await? else {
        return Ok(AnalyzeOutcome::NotFound);
    };

    let config = LlmConfig::from_env();

    // Step 2: provider construction errors never propagate raw — they
    // become an observable `llm_init_error` row.
    let provider = match provider_factory(&config) {
        Ok(p) => p,
        Err(e) => {
            let provider_name = match config.provider {
                news_config::LlmProviderKind::OpenAi => "openai",
                news_config::LlmProviderKind::Gemini => "gemini",
            };
            let model = if provider_name == "openai" {
                config.openai_model.clone()
            } else {
                config.gemini_model.clone()
            };
            let analysis_id = news_db::start_analysis(
                pool,
                news_event_id,
                trace_id,
                provider_name,
                &model,
                &Value::Null,
            )
            .await?;
            let error_message = format!("llm_init_error: {e}");
            news_db::mark_analysis_failed(
                pool,
                analysis_id,
                &error_message,
                Some(&no_attempts_raw_output()),
                None,
            )
            .await?;
            return Ok(AnalyzeOutcome::Failed { analysis_id, error_message });
        }
    };

    let analysis_id =
        news_db::start_analysis(pool, news_event_id, trace_id, provider.name(), provider.model(), &Value::Null)
            .await?;

    let input_text = build_input_text(&event.title, Some(event.url.as_str()), event.content.as_deref());
    let max_retries = config.max_retries;
    let mut attempts: Vec<AttemptRecord> = Vec::new();
    let mut last_request: Option<Value> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        let prompt = if attempt == 0 {
            build_prompt(&input_text)
        } else {
            build_retry_prompt(&input_text)
        };

        let request = json!({
            "prompt": prompt,
            "provider": provider.name(),
            "model": provider.model(),
            "timeout_seconds": config.timeout_seconds,
            "max_retries": max_retries,
        });
        last_request = Some(request);

        info!(provider = provider.name(), model = provider.model(), attempt, "llm_attempt");

        match provider.generate(&prompt, config.timeout_seconds).await {
            Ok((output_text, raw_response)) => match parse_and_validate(&output_text) {
                Ok((result, output_json)) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        prompt,
                        output_text: Some(output_text.clone()),
                        output_json: Some(output_json.clone()),
                        raw_response: raw_response.clone(),
                        error: None,
                    });
                    info!(provider = provider.name(), model = provider.model(), attempt, "llm_attempt_success");

                    let raw_output = json!({
                        "error": Value::Null,
                        "response": raw_response,
                        "output_text": output_text,
                        "output_json": output_json,
                    });
                    news_db::mark_analysis_succeeded(
                        pool,
                        analysis_id,
                        result.sentiment.as_str(),
                        result.confidence,
                        &result.reasoning_summary,
                        &raw_output,
                        last_request.as_ref().unwrap_or(&Value::Null),
                    )
                    .await?;
                    news_db::replace_analysis_tickers(pool, analysis_id, &result.tickers).await?;

                    return Ok(AnalyzeOutcome::Succeeded { analysis_id, result });
                }
                Err(validation_error) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        prompt,
                        output_text: Some(output_text),
                        output_json: None,
                        raw_response,
                        error: Some(validation_error.clone()),
                    });
                    warn!(provider = provider.name(), attempt, error = %validation_error, "llm_attempt_failed");
                }
            },
            Err(provider_error) => {
                let error_text = match provider_error.code() {
                    Some(code) => format!("provider_error:{code}:{provider_error}"),
                    None => format!("provider_error:{provider_error}"),
                };
                let non_retryable = provider_error.code() == Some("insufficient_quota");
                attempts.push(AttemptRecord {
                    attempt,
                    prompt,
                    output_text: None,
                    output_json: None,
                    raw_response: None,
                    error: Some(error_text.clone()),
                });
                warn!(provider = provider.name(), attempt, error = %error_text, "llm_attempt_failed");

                if non_retryable {
                    break;
                }
            }
        }
    }

    // Step 6/7: no attempt succeeded — persist the domain failure.
    let domain_error = AnalysisError { attempts };
    let last_attempt = domain_error.attempts.last();
    let raw_output = match last_attempt {
        Some(a) => json!({
            "error": a.error,
            "response": a.raw_response,
            "output_text": a.output_text,
            "output_json": a.output_json,
        }),
        None => no_attempts_raw_output(),
    };
    let error_message = if last_attempt.is_some() {
        format!("{domain_error}")
    } else {
        "unexpected_error: no attempts were made".to_string()
    };

    news_db::mark_analysis_failed(pool, analysis_id, &error_message, Some(&raw_output), last_request.as_ref())
        .await?;

    Ok(AnalyzeOutcome::Failed { analysis_id, error_message })
}

fn no_attempts_raw_output() -> Value {
    json!({
        "error": "no_attempts",
        "response": Value::Null,
        "output_text": Value::Null,
        "output_json": Value::Null,
    })
}
