//! Wire/DTO types shared by every other crate in this workspace.
//!
//! Nothing in this crate performs I/O. Each type here is the boundary object
//! a consumer extracts from a payload blob once (C3/C9) rather than reaching
//! into JSON maps ad hoc — see `SPEC_FULL.md` §9.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An upstream payload captured verbatim, keyed by `(source, dedup_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub raw_id: i64,
    pub source: String,
    pub trace_id: Uuid,
    pub fetched_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub dedup_key: String,
    pub raw_payload: Value,
    pub status: RawItemStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawItemStatus {
    Fetched,
    Normalized,
    Failed,
}

impl RawItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawItemStatus::Fetched => "fetched",
            RawItemStatus::Normalized => "normalized",
            RawItemStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "fetched" => Ok(RawItemStatus::Fetched),
            "normalized" => Ok(RawItemStatus::Normalized),
            "failed" => Ok(RawItemStatus::Failed),
            other => Err(anyhow::anyhow!("invalid raw item status: {other}")),
        }
    }
}

/// A single upstream item, as handed from the fetch stage into C4 raw
/// persistence, before any row identity has been assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedItem {
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub request_ticker: Option<String>,
    pub raw_payload: Value,
}

/// Canonical, deduplicated article. Immutable once created (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: i64,
    pub news_id: String,
    pub trace_id: Uuid,
    pub source: String,
    pub request_ticker: Option<String>,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub tickers: Vec<String>,
    pub raw_payload: Value,
}

/// A `NewsEvent` before it has been assigned a row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNewsEvent {
    pub news_id: String,
    pub trace_id: Uuid,
    pub source: String,
    pub request_ticker: Option<String>,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub tickers: Vec<String>,
    pub raw_payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(anyhow::anyhow!("invalid job status: {other}")),
        }
    }
}

pub const JOB_TYPE_LLM_ANALYSIS: &str = "llm_analysis";

/// A unit of work on the SQL-backed queue (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: i64,
    pub job_uuid: Uuid,
    pub news_event_id: i64,
    pub job_type: String,
    pub trace_id: Uuid,
    pub status: JobStatus,
    pub attempts: i32,
    pub run_after: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Pending,
    Succeeded,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Succeeded => "succeeded",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "succeeded" => Ok(AnalysisStatus::Succeeded),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(anyhow::anyhow!("invalid analysis status: {other}")),
        }
    }
}

/// The verdict for one event, one `(provider, model)` pair (§3 `LLMAnalysis`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub id: i64,
    pub news_event_id: i64,
    pub trace_id: Uuid,
    pub provider: String,
    pub model: String,
    pub status: AnalysisStatus,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub summary: Option<String>,
    pub entities: Vec<String>,
    pub request: Option<Value>,
    pub raw_output: Option<Value>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(anyhow::anyhow!("invalid run status: {other}")),
        }
    }
}

/// Per-invocation ingestion bookkeeping (§3 `IngestionRun`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: i64,
    pub job_name: String,
    pub trace_id: Uuid,
    pub status: RunStatus,
    pub tickers: Vec<String>,
    pub window_from: DateTime<Utc>,
    pub window_to: DateTime<Utc>,
    pub fetched_count: i64,
    pub inserted_count: i64,
    pub deduped_count: i64,
    pub error_message: Option<String>,
    pub meta: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// The validated in-memory contract between C9 and C7/C8 (§3 `AnalysisResult`).
/// No extra fields permitted — this is the parsed, schema-checked shape, never
/// the raw provider JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tickers: Vec<String>,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub reasoning_summary: String,
}
