//! C9 (LLM orchestrator) and C10 (provider adapters).

pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod validate;

pub use error::{AnalysisError, AttemptRecord, ProviderError};
pub use orchestrator::{analyze, analyze_with_provider_factory, AnalyzeOutcome};
pub use provider::{build_provider, FakeProvider, GeminiAdapter, OpenAiAdapter, ProviderAdapter};
