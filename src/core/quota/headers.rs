//! Upstream rate-limit header parsing
//!
//! The upstream reports its own enforcement through a limit/remaining/reset
//! header trio. Values may arrive as a comma-separated list of window-tagged
//! entries (`"100, 100;window=60, 10000;window=86400"`); only the primary
//! value matters here - the first token with any `;attr=value` suffix
//! stripped. Parse failures never fail a relay call: reconciliation is
//! skipped and local accounting stands (fail-open).

use crate::utils::error::{GatewayError, Result};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::warn;

/// Draft-standard header names, checked before the legacy `X-` forms
const LIMIT_HEADERS: [&str; 2] = ["ratelimit-limit", "x-ratelimit-limit"];
const REMAINING_HEADERS: [&str; 2] = ["ratelimit-remaining", "x-ratelimit-remaining"];
const RESET_HEADERS: [&str; 2] = ["ratelimit-reset", "x-ratelimit-reset"];

/// One upstream enforcement report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderSnapshot {
    /// Window capacity the upstream enforced
    pub limit: u64,
    /// Requests the upstream still permits in that window
    pub remaining: u64,
    /// Seconds until the upstream's window resets, when reported
    pub reset_after: Option<Duration>,
}

/// Parse the primary value of a rate-limit header: the first
/// comma-separated token, stripped of any `;attr=value` suffix.
pub(crate) fn parse_primary_value(raw: &str) -> Result<u64> {
    let first = raw
        .split(',')
        .next()
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();

    if first.is_empty() {
        return Err(GatewayError::Parsing(
            "empty rate-limit header value".to_string(),
        ));
    }

    first.parse::<u64>().map_err(|e| {
        GatewayError::Parsing(format!("invalid rate-limit header value {:?}: {}", raw, e))
    })
}

fn header_value<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

/// Extract an enforcement report from upstream response headers.
///
/// Returns `None` when the trio is absent or unparseable; the caller skips
/// reconciliation in that case.
pub(crate) fn snapshot(headers: &HeaderMap) -> Option<HeaderSnapshot> {
    let limit_raw = header_value(headers, &LIMIT_HEADERS)?;
    let remaining_raw = header_value(headers, &REMAINING_HEADERS)?;

    let limit = match parse_primary_value(limit_raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Skipping quota reconciliation: {}", e);
            return None;
        }
    };
    let remaining = match parse_primary_value(remaining_raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Skipping quota reconciliation: {}", e);
            return None;
        }
    };

    // Reset is advisory; a bad value degrades to the window-length default.
    let reset_after = header_value(headers, &RESET_HEADERS)
        .and_then(|raw| parse_primary_value(raw).ok())
        .map(Duration::from_secs);

    Some(HeaderSnapshot {
        limit,
        remaining,
        reset_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_primary_value_plain() {
        assert_eq!(parse_primary_value("100").unwrap(), 100);
        assert_eq!(parse_primary_value("  42  ").unwrap(), 42);
    }

    #[test]
    fn test_parse_primary_value_window_list() {
        assert_eq!(
            parse_primary_value("100, 100;window=60, 10000;window=86400").unwrap(),
            100
        );
        assert_eq!(parse_primary_value("95;window=60").unwrap(), 95);
    }

    #[test]
    fn test_parse_primary_value_rejects_empty() {
        assert!(parse_primary_value("").is_err());
        assert!(parse_primary_value("   ").is_err());
        assert!(parse_primary_value(";window=60").is_err());
    }

    #[test]
    fn test_parse_primary_value_rejects_garbage() {
        assert!(parse_primary_value("abc").is_err());
        assert!(parse_primary_value("12.5").is_err());
        assert!(parse_primary_value("-3").is_err());
    }

    fn headers(entries: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_snapshot_draft_headers() {
        let map = headers(&[
            ("ratelimit-limit", "100, 100;window=60, 10000;window=86400"),
            ("ratelimit-remaining", "95"),
            ("ratelimit-reset", "30"),
        ]);
        let snapshot = snapshot(&map).unwrap();
        assert_eq!(snapshot.limit, 100);
        assert_eq!(snapshot.remaining, 95);
        assert_eq!(snapshot.reset_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_snapshot_legacy_headers() {
        let map = headers(&[
            ("x-ratelimit-limit", "10000"),
            ("x-ratelimit-remaining", "9200"),
        ]);
        let snapshot = snapshot(&map).unwrap();
        assert_eq!(snapshot.limit, 10000);
        assert_eq!(snapshot.remaining, 9200);
        assert_eq!(snapshot.reset_after, None);
    }

    #[test]
    fn test_snapshot_missing_headers() {
        assert!(snapshot(&HeaderMap::new()).is_none());

        // Limit alone is not a usable report.
        let map = headers(&[("ratelimit-limit", "100")]);
        assert!(snapshot(&map).is_none());
    }

    #[test]
    fn test_snapshot_unparseable_is_skipped() {
        let map = headers(&[
            ("ratelimit-limit", "abc"),
            ("ratelimit-remaining", "95"),
        ]);
        assert!(snapshot(&map).is_none());
    }
}
