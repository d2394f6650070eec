//! C1 (URL canonicalizer), C2 (timestamp parser), C3 (news normalizer).
//!
//! Pure functions only — no I/O, no database, no HTTP. Everything here is
//! deterministic and unit-tested directly against §8's Laws and Boundary
//! behaviors.

pub mod dedup;
pub mod normalize;
pub mod timestamp;
pub mod url_canon;

pub use dedup::dedup_key;
pub use normalize::{normalize, parse_related_tickers, NewsError, DEFAULT_SOURCE};
pub use timestamp::{parse_timestamp, parse_timestamp_str};
pub use url_canon::{canonicalize_url, news_id};
