//! C10 — provider adapters. Thin, swappable wrappers; adapters never retry,
//! they only translate transport/HTTP outcomes into `ProviderError`.

use crate::error::ProviderError;
use async_trait::async_trait;
use news_config::{LlmConfig, LlmProviderKind};
use serde_json::{json, Value};
use std::time::Duration;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn generate(&self, prompt: &str, timeout_seconds: u64) -> Result<(String, Option<Value>), ProviderError>;
}

/// Build the configured provider, failing with `ProviderError::Config` if
/// the required API key is absent — caught by C9 and turned into a
/// `llm_init_error` row rather than propagated raw (§4.9 step 2).
pub fn build_provider(config: &LlmConfig) -> Result<Box<dyn ProviderAdapter>, ProviderError> {
    match config.provider {
        LlmProviderKind::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| ProviderError::Config("missing OPENAI_API_KEY".to_string()))?;
            Ok(Box::new(OpenAiAdapter {
                api_key,
                model: config.openai_model.clone(),
            }))
        }
        LlmProviderKind::Gemini => {
            let api_key = config
                .google_api_key
                .clone()
                .ok_or_else(|| ProviderError::Config("missing GOOGLE_API_KEY".to_string()))?;
            Ok(Box::new(GeminiAdapter {
                api_key,
                model: config.gemini_model.clone(),
            }))
        }
    }
}

fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| ProviderError::Transport(e.to_string()))
}

fn is_quota_body(body: &str) -> bool {
    body.to_ascii_lowercase().contains("insufficient_quota")
}

pub struct OpenAiAdapter {
    api_key: String,
    model: String,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, timeout_seconds: u64) -> Result<(String, Option<Value>), ProviderError> {
        let client = http_client(timeout_seconds)?;
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
        });

        let resp = client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transport(format!("timeout: {e}"))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let raw: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let text = raw.to_string();
            if status.as_u16() == 429 && is_quota_body(&text) {
                return Err(ProviderError::InsufficientQuota(text));
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();

        Ok((content, Some(raw)))
    }
}

pub struct GeminiAdapter {
    api_key: String,
    model: String,
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, timeout_seconds: u64) -> Result<(String, Option<Value>), ProviderError> {
        let client = http_client(timeout_seconds)?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.0},
        });

        let resp = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transport(format!("timeout: {e}"))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let raw: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let text = raw.to_string();
            if status.as_u16() == 429 && is_quota_body(&text) {
                return Err(ProviderError::InsufficientQuota(text));
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = raw
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();

        Ok((content, Some(raw)))
    }
}

/// Deterministic adapter for tests: returns a scripted sequence of
/// responses, one per call, and records the prompts it was given.
pub struct FakeProvider {
    pub responses: std::sync::Mutex<std::vec::IntoIter<Result<String, ProviderError>>>,
}

impl FakeProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate(&self, _prompt: &str, _timeout_seconds: u64) -> Result<(String, Option<Value>), ProviderError> {
        let mut guard = self.responses.lock().expect("fake provider mutex poisoned");
        match guard.next() {
            Some(Ok(text)) => Ok((text, None)),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::EmptyResponse),
        }
    }
}
