//! C7 — ingestion orchestrator (advisory-locked run, windowing, fetch,
//! rate shaping, normalize-and-enqueue). §4.7.

pub mod finnhub;
pub mod orchestrator;
pub mod provenance;
pub mod rate_shape;
pub mod window;

pub use finnhub::{CompanyNewsSource, FakeCompanyNewsSource, FinnhubClient, FinnhubError};
pub use orchestrator::{run, RunOptions, RunOutcome, JOB_NAME};
pub use window::IngestionWindow;
