//! Environment-variable configuration, §6 and `SPEC_FULL.md` §10.4.
//!
//! A single `NewsConfig::from_env()` entry point, following the teacher's
//! `resolve_secrets_for_mode`-style contract: config is read from the
//! environment exactly once at process start, secret fields are redacted by
//! a hand-written `Debug` impl, and every failure names the missing env var
//! — never a value.

use anyhow::Result;

/// Read a named env var. Blank-after-trim is treated as absent, matching the
/// teacher's `resolve_env` helper.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn require_env(var_name: &str) -> Result<String> {
    resolve_env(var_name).ok_or_else(|| anyhow::anyhow!("missing required env var '{var_name}'"))
}

/// Parse an integer env var, falling back to `default` if unset or
/// unparseable.
fn get_env_int(var_name: &str, default: i64) -> i64 {
    resolve_env(var_name)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: require_env("POSTGRES_HOST")?,
            port: get_env_int("POSTGRES_PORT", 5432) as u16,
            database: require_env("POSTGRES_DB")?,
            user: require_env("POSTGRES_USER")?,
            password: require_env("POSTGRES_PASSWORD")?,
        })
    }

    /// Postgres connection URL built from the resolved fields. Never logged
    /// or included in `Debug` output (it embeds the password).
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencode(&self.user),
            urlencode(&self.password),
            self.host,
            self.port,
            self.database
        )
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[derive(Clone)]
pub struct IngestConfig {
    pub finnhub_token: Option<String>,
    pub latest_per_run_per_ticker: i64,
    pub daily_max_per_ticker: i64,
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("finnhub_token", &self.finnhub_token.as_ref().map(|_| "<REDACTED>"))
            .field("latest_per_run_per_ticker", &self.latest_per_run_per_ticker)
            .field("daily_max_per_ticker", &self.daily_max_per_ticker)
            .finish()
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self {
            finnhub_token: resolve_env("FINNHUB_TOKEN"),
            latest_per_run_per_ticker: get_env_int("INTAKE_LATEST_PER_RUN_PER_TICKER", 10),
            daily_max_per_ticker: get_env_int("INTAKE_DAILY_MAX_PER_TICKER", 100),
        }
    }

    /// Fail-fast check used by the ingestion CLI unless `--replay-only`.
    pub fn require_finnhub_token(&self) -> Result<&str> {
        self.finnhub_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing required env var 'FINNHUB_TOKEN'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    Gemini,
}

impl LlmProviderKind {
    /// `LLM_PROVIDER` defaults to `openai`; any value other than `openai`
    /// coerces to `gemini` (§6) — there is no "unknown provider" error here.
    fn from_env_value(v: Option<&str>) -> Self {
        match v.map(str::trim) {
            Some("openai") | None => LlmProviderKind::OpenAi,
            Some(_) => LlmProviderKind::Gemini,
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<REDACTED>"))
            .field("openai_model", &self.openai_model)
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<REDACTED>"))
            .field("gemini_model", &self.gemini_model)
            .finish()
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let provider = LlmProviderKind::from_env_value(resolve_env("LLM_PROVIDER").as_deref());
        let timeout_seconds = get_env_int("LLM_TIMEOUT_SECONDS", 20);
        // Non-positive timeouts fall back to the default, matching the
        // reference factory's guard on a misconfigured env value.
        let timeout_seconds = if timeout_seconds <= 0 { 20 } else { timeout_seconds as u64 };

        Self {
            provider,
            timeout_seconds,
            max_retries: get_env_int("LLM_MAX_RETRIES", 2).max(0) as u32,
            openai_api_key: resolve_env("OPENAI_API_KEY"),
            openai_model: resolve_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            google_api_key: resolve_env("GOOGLE_API_KEY"),
            gemini_model: resolve_env("GEMINI_MODEL").unwrap_or_else(|| "gemini-3-flash-preview".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_seconds: u64,
    pub visibility_timeout_seconds: i64,
    pub max_attempts: i32,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            poll_seconds: get_env_int("WORKER_POLL_SECONDS", 10).max(0) as u64,
            visibility_timeout_seconds: get_env_int("WORKER_VISIBILITY_TIMEOUT_SECONDS", 300),
            max_attempts: get_env_int("WORKER_MAX_ATTEMPTS", 3) as i32,
        }
    }
}

#[derive(Clone)]
pub struct NewsConfig {
    pub db: DbConfig,
    pub ingest: IngestConfig,
    pub llm: LlmConfig,
    pub worker: WorkerConfig,
    pub log_level: String,
}

impl std::fmt::Debug for NewsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsConfig")
            .field("db", &self.db)
            .field("ingest", &self.ingest)
            .field("llm", &self.llm)
            .field("worker", &self.worker)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl NewsConfig {
    /// Resolve every env var named in §6. Database vars are always required
    /// (POSTGRES_PORT excepted, which defaults); `FINNHUB_TOKEN` is checked
    /// lazily via `IngestConfig::require_finnhub_token` since it is only
    /// required when the caller isn't running `--replay-only`.
    pub fn from_env() -> Result<Self> {
        let db = DbConfig::from_env()?;
        Ok(Self {
            db,
            ingest: IngestConfig::from_env(),
            llm: LlmConfig::from_env(),
            worker: WorkerConfig::from_env(),
            log_level: resolve_env("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
        })
    }
}

/// Load `.env.local` if present, mirroring the teacher's dev-time bootstrap.
/// Absence of the file is normal in production and is not an error.
pub fn load_dotenv_local() {
    let _ = dotenvy::from_filename(".env.local");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "POSTGRES_HOST", "POSTGRES_PORT", "POSTGRES_DB", "POSTGRES_USER", "POSTGRES_PASSWORD",
            "FINNHUB_TOKEN", "LLM_PROVIDER", "LLM_TIMEOUT_SECONDS", "LLM_MAX_RETRIES",
            "OPENAI_API_KEY", "GOOGLE_API_KEY", "LOG_LEVEL",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn missing_db_vars_fail_fast_naming_the_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = NewsConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("POSTGRES_HOST"));
    }

    #[test]
    fn llm_provider_defaults_to_openai_and_coerces_unknown_to_gemini() {
        assert_eq!(LlmProviderKind::from_env_value(None), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::from_env_value(Some("openai")), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::from_env_value(Some("anthropic")), LlmProviderKind::Gemini);
        assert_eq!(LlmProviderKind::from_env_value(Some("gemini")), LlmProviderKind::Gemini);
    }

    #[test]
    fn debug_impl_redacts_secrets() {
        let cfg = DbConfig {
            host: "localhost".into(),
            port: 5432,
            database: "news".into(),
            user: "app".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<REDACTED>"));
    }
}
