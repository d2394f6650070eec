//! Dedup key computation shared by C4 (raw store). §3 `RawItem` invariant,
//! grounded on `original_source/.../raw_store.py` `_dedup_key`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::url_canon::canonicalize_url;

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// `dedup_key = sha256("{source}|{canonical_url or url}")` when `url` is
/// present at all — a `canonicalize_url` failure falls back to the raw url,
/// never to title+timestamp; otherwise
/// `sha256("{source}|{title}|{published_at_iso or ''}")`.
pub fn dedup_key(
    source: &str,
    url: Option<&str>,
    title: Option<&str>,
    published_at: Option<DateTime<Utc>>,
) -> String {
    if let Some(u) = url {
        let canonical_or_raw = canonicalize_url(u).unwrap_or_else(|_| u.to_string());
        return sha256_hex(&format!("{source}|{canonical_or_raw}"));
    }
    let title = title.unwrap_or("");
    let iso = published_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    sha256_hex(&format!("{source}|{title}|{iso}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_same_source_same_key() {
        let a = dedup_key("finnhub", Some("https://x.com/a?utm_source=z"), None, None);
        let b = dedup_key("finnhub", Some("https://x.com/a?utm_campaign=y"), None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn falls_back_to_title_and_timestamp_without_url() {
        let now = Utc::now();
        let a = dedup_key("finnhub", None, Some("Headline"), Some(now));
        let b = dedup_key("finnhub", None, Some("Headline"), Some(now));
        assert_eq!(a, b);
        let c = dedup_key("finnhub", None, Some("Other"), Some(now));
        assert_ne!(a, c);
    }
}
