//! End-to-end scenarios 1-4 of §8, against a real database with a
//! `FakeProvider` standing in for the network call.

use news_llm::{analyze_with_provider_factory, AnalyzeOutcome, FakeProvider, ProviderError};
use news_testkit::{seed_news_event, test_pool};

fn set_llm_env() {
    std::env::set_var("LLM_PROVIDER", "openai");
    std::env::set_var("LLM_MAX_RETRIES", "2");
    std::env::set_var("LLM_TIMEOUT_SECONDS", "5");
    std::env::set_var("OPENAI_API_KEY", "test-key");
}

#[tokio::test]
async fn happy_path_succeeds_on_first_attempt() {
    set_llm_env();
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://x.com/a").await;

    let responses = vec![Ok(
        r#"{"tickers":["AAPL","MSFT"],"sentiment":"positive","confidence":0.9,"reasoning_summary":"Strong demand."}"#
            .to_string(),
    )];

    let outcome = analyze_with_provider_factory(&pool, event_id, |_cfg| Ok(Box::new(FakeProvider::new(responses))))
        .await
        .unwrap();

    let analysis_id = match outcome {
        AnalyzeOutcome::Succeeded { result, analysis_id } => {
            assert_eq!(result.tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
            assert_eq!(result.sentiment.as_str(), "positive");
            assert_eq!(result.confidence, 0.9);
            analysis_id
        }
        other => panic!("expected success, got {other:?}"),
    };

    let analysis = news_db::fetch_llm_analysis(&pool, analysis_id).await.unwrap();
    assert_eq!(analysis.entities, vec!["AAPL".to_string(), "MSFT".to_string()]);
}

#[tokio::test]
async fn invalid_json_three_times_fails_with_full_audit_trail() {
    set_llm_env();
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://x.com/b").await;

    let responses = vec![
        Ok("not-json".to_string()),
        Ok("not-json".to_string()),
        Ok("not-json".to_string()),
    ];

    let outcome = analyze_with_provider_factory(&pool, event_id, |_cfg| Ok(Box::new(FakeProvider::new(responses))))
        .await
        .unwrap();

    match outcome {
        AnalyzeOutcome::Failed { analysis_id, .. } => {
            let analysis = news_db::fetch_llm_analysis(&pool, analysis_id).await.unwrap();
            assert_eq!(analysis.status.as_str(), "failed");
            assert!(analysis.error_message.unwrap().contains("invalid json"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_violation_three_times_fails_with_validation_message() {
    set_llm_env();
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://x.com/c").await;

    let bad = r#"{"tickers":["AAPL"],"sentiment":"positive","confidence":2,"reasoning_summary":"bad"}"#;
    let responses = vec![Ok(bad.to_string()), Ok(bad.to_string()), Ok(bad.to_string())];

    let outcome = analyze_with_provider_factory(&pool, event_id, |_cfg| Ok(Box::new(FakeProvider::new(responses))))
        .await
        .unwrap();

    match outcome {
        AnalyzeOutcome::Failed { analysis_id, .. } => {
            let analysis = news_db::fetch_llm_analysis(&pool, analysis_id).await.unwrap();
            assert!(analysis.error_message.unwrap().contains("confidence"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn insufficient_quota_aborts_after_one_attempt() {
    set_llm_env();
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://x.com/d").await;

    let responses = vec![Err(ProviderError::InsufficientQuota("over quota".to_string()))];

    let outcome = analyze_with_provider_factory(&pool, event_id, |_cfg| Ok(Box::new(FakeProvider::new(responses))))
        .await
        .unwrap();

    match outcome {
        AnalyzeOutcome::Failed { analysis_id, .. } => {
            let analysis = news_db::fetch_llm_analysis(&pool, analysis_id).await.unwrap();
            assert!(analysis.error_message.unwrap().contains("insufficient_quota"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
