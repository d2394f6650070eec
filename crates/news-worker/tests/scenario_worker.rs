//! §8 end-to-end scenario 6 (stuck-lease recovery) plus the claim/dispatch
//! Invariants not already exercised by `news-llm`'s own test suite.

use news_schemas::JOB_TYPE_LLM_ANALYSIS;
use news_testkit::{seed_news_event, test_pool};
use news_worker::{retry, WorkerOptions};
use uuid::Uuid;

async fn seed_job(pool: &sqlx::PgPool, news_event_id: i64, job_type: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        insert into analysis_jobs (job_uuid, news_event_id, job_type, trace_id, status)
        values ($1, $2, $3, $1, 'pending')
        returning id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(news_event_id)
    .bind(job_type)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn options(once: bool) -> WorkerOptions {
    WorkerOptions {
        poll_seconds: 1,
        batch_size: 10,
        max_attempts: 3,
        visibility_timeout_seconds: 0,
        worker_id: "test-worker".to_string(),
        once,
    }
}

#[tokio::test]
async fn unknown_job_type_fails_terminally_on_first_attempt() {
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://news.example.com/unknown-type").await;
    let job_id = seed_job(&pool, event_id, "unsupported_job_type").await;

    news_worker::run(&pool, options(true)).await.unwrap();

    let status: String = sqlx::query_scalar("select status from analysis_jobs where id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let attempts: i32 = sqlx::query_scalar("select attempts from analysis_jobs where id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "failed");
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn llm_job_without_provider_credentials_fails_terminally() {
    // No OPENAI_API_KEY/GEMINI_API_KEY in the test environment: provider
    // construction fails deterministically and the resulting
    // "llm_init_error: ..." message carries none of the retryable tokens.
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://news.example.com/llm-job").await;
    let job_id = seed_job(&pool, event_id, JOB_TYPE_LLM_ANALYSIS).await;

    news_worker::run(&pool, options(true)).await.unwrap();

    let status: String = sqlx::query_scalar("select status from analysis_jobs where id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "failed");
}

#[tokio::test]
async fn stuck_lease_is_swept_back_to_pending_and_reclaimed() {
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://news.example.com/stuck-lease").await;
    let job_id = seed_job(&pool, event_id, "unsupported_job_type").await;

    // Simulate worker A claiming the job, then dying mid-flight: status
    // `running`, lease timestamp already in the past.
    sqlx::query(
        r#"
        update analysis_jobs
        set status = 'running', locked_at = now() - interval '1 hour', locked_by = 'worker-a'
        where id = $1
        "#,
    )
    .bind(job_id)
    .execute(&pool)
    .await
    .unwrap();

    // visibility_timeout_seconds = 0: any `running` lease older than "now"
    // is immediately eligible for the sweep.
    news_worker::run(&pool, options(true)).await.unwrap();

    let row: (String, String) = sqlx::query_as("select status, locked_by from analysis_jobs where id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    // worker B's cycle sweeps it back to pending, then claims and
    // terminally fails it within the same cycle (unsupported job type).
    assert_eq!(row.0, "failed");
    assert_ne!(row.1, "worker-a");
}

#[tokio::test]
async fn job_at_max_attempts_is_never_reclaimed() {
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://news.example.com/exhausted").await;
    let job_id = seed_job(&pool, event_id, "unsupported_job_type").await;

    sqlx::query("update analysis_jobs set attempts = 3 where id = $1")
        .bind(job_id)
        .execute(&pool)
        .await
        .unwrap();

    news_worker::run(&pool, options(true)).await.unwrap();

    let row: (String, i32) = sqlx::query_as("select status, attempts from analysis_jobs where id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "pending");
    assert_eq!(row.1, 3);
}

#[tokio::test]
async fn concurrent_claims_never_double_assign_a_job() {
    let pool = test_pool().await;
    let event_id = seed_news_event(&pool, "finnhub", "https://news.example.com/no-overlap").await;
    let job_id = seed_job(&pool, event_id, JOB_TYPE_LLM_ANALYSIS).await;

    let a = news_db::claim_jobs(&pool, "run_after", 1, 3, "worker-a");
    let b = news_db::claim_jobs(&pool, "run_after", 1, 3, "worker-b");
    let (claimed_a, claimed_b) = tokio::join!(a, b);
    let claimed_a = claimed_a.unwrap();
    let claimed_b = claimed_b.unwrap();

    let total = claimed_a.len() + claimed_b.len();
    assert_eq!(total, 1);
    let claimed_id = claimed_a.first().or(claimed_b.first()).map(|j| j.id).unwrap();
    assert_eq!(claimed_id, job_id);
}

#[test]
fn retry_module_is_reexported() {
    assert_eq!(retry::classify("plain failure"), retry::RetryDecision::Terminal);
}
