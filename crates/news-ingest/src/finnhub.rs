//! Upstream fetch-with-retry, §4.7 step 5.
//!
//! Grounded on `original_source/.../ingestion/finnhub_client.py`
//! `_request_with_retries`/`fetch_company_news`: up to 3 total attempts,
//! transport errors and 429/5xx are retryable, `Retry-After` wins over
//! exponential backoff when it is a plain integer, any other 4xx is fatal.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const BASE_URL: &str = "https://finnhub.io/api/v1";
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum FinnhubError {
    #[error("finnhub request failed: {0}")]
    Transport(String),
    #[error("finnhub request failed with status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected finnhub payload: {0}")]
    UnexpectedPayload(String),
}

#[async_trait]
pub trait CompanyNewsSource: Send + Sync {
    async fn fetch_company_news(
        &self,
        symbol: &str,
        date_from: &str,
        date_to: &str,
        trace_id: Uuid,
    ) -> Result<Vec<Value>, FinnhubError>;
}

pub struct FinnhubClient {
    client: reqwest::Client,
    token: String,
}

impl FinnhubClient {
    pub fn new(token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, token })
    }

    async fn request_with_retries(
        &self,
        symbol: &str,
        date_from: &str,
        date_to: &str,
        trace_id: Uuid,
    ) -> Result<reqwest::Response, FinnhubError> {
        let url = format!("{BASE_URL}/company-news");
        let mut last_transport_error: Option<String> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let send_result = self
                .client
                .get(&url)
                .query(&[
                    ("symbol", symbol),
                    ("from", date_from),
                    ("to", date_to),
                    ("token", self.token.as_str()),
                ])
                .send()
                .await;

            let response = match send_result {
                Ok(r) => r,
                Err(e) => {
                    last_transport_error = Some(e.to_string());
                    if attempt == MAX_ATTEMPTS {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt - 1))).await;
                    continue;
                }
            };

            let status = response.status();
            info!(trace_id = %trace_id, ticker = symbol, status = status.as_u16(), attempt, "finnhub_http_response");

            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 || status.is_server_error() {
                if attempt == MAX_ATTEMPTS {
                    let body = response.text().await.unwrap_or_default();
                    return Err(FinnhubError::Http { status: status.as_u16(), body });
                }
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let sleep_seconds = retry_after.map(|s| s.max(1)).unwrap_or_else(|| 2u64.pow(attempt - 1));
                tokio::time::sleep(Duration::from_secs(sleep_seconds)).await;
                continue;
            }

            // Any other 4xx is fatal for this call.
            let body = response.text().await.unwrap_or_default();
            return Err(FinnhubError::Http { status: status.as_u16(), body });
        }

        Err(FinnhubError::Transport(
            last_transport_error.unwrap_or_else(|| "finnhub request failed".to_string()),
        ))
    }
}

#[async_trait]
impl CompanyNewsSource for FinnhubClient {
    async fn fetch_company_news(
        &self,
        symbol: &str,
        date_from: &str,
        date_to: &str,
        trace_id: Uuid,
    ) -> Result<Vec<Value>, FinnhubError> {
        let response = self.request_with_retries(symbol, date_from, date_to, trace_id).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| FinnhubError::Transport(format!("invalid response body: {e}")))?;

        let items = payload
            .as_array()
            .ok_or_else(|| FinnhubError::UnexpectedPayload(payload.to_string()))?
            .clone();

        info!(trace_id = %trace_id, ticker = symbol, items = items.len(), "finnhub_items");
        Ok(items)
    }
}

/// Deterministic source for tests: a fixed map of `symbol -> items` (or a
/// scripted error), never touching the network.
pub struct FakeCompanyNewsSource {
    pub items_by_symbol: std::collections::HashMap<String, Result<Vec<Value>, String>>,
}

impl FakeCompanyNewsSource {
    pub fn new(items_by_symbol: std::collections::HashMap<String, Result<Vec<Value>, String>>) -> Self {
        Self { items_by_symbol }
    }
}

#[async_trait]
impl CompanyNewsSource for FakeCompanyNewsSource {
    async fn fetch_company_news(
        &self,
        symbol: &str,
        _date_from: &str,
        _date_to: &str,
        _trace_id: Uuid,
    ) -> Result<Vec<Value>, FinnhubError> {
        match self.items_by_symbol.get(symbol) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(e)) => Err(FinnhubError::Transport(e.clone())),
            None => Ok(Vec::new()),
        }
    }
}
