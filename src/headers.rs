/// Prepares the client's request headers for forwarding upstream: strips
/// any header whose name starts with `Proxy-` (case-insensitive), the way
/// `RangeFetch.__init__` does in the original implementation, and forces
/// `Connection: keep-alive` so the session's pool can reuse the semantics
/// the rest of this crate assumes for the outbound leg (§3 "Session", §6).
pub fn forwardable_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut forwarded: Vec<(String, String)> = headers.iter()
        .filter(|(name, _)| {
            let lower = name.to_ascii_lowercase();
            !lower.starts_with("proxy-") && lower != "connection"
        })
        .cloned()
        .collect();
    forwarded.push(("Connection".to_string(), "keep-alive".to_string()));
    forwarded
}

/// An inbound `Range: bytes=...` header, parsed per the pattern
/// `^bytes=(\d*)-(\d*)(,..)?` (§4.G). Only the single-range, closed-start
/// form is accepted; anything else is `None` so the caller can answer 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedRange {
    pub start: u64,
    pub end: Option<u64>,
}

pub fn parse_range(value: &str) -> Option<ParsedRange> {
    let value = value.trim();
    let rest = value.strip_prefix("bytes=")?;
    // A multi-range request has a `,` tail; reject it outright (§4.G).
    if rest.contains(',') {
        return None;
    }
    let dash = rest.find('-')?;
    let (start_str, end_str) = (&rest[..dash], &rest[dash + 1..]);
    if start_str.is_empty() {
        // Open/suffix range ("bytes=-500") is not supported (§1 Non-goals).
        return None;
    }
    let start = start_str.parse().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse().ok()?)
    };
    Some(ParsedRange { start, end })
}

/// Parses an upstream `Content-Range: bytes START-END/LENGTH` header,
/// returning `(start, end, length)`.
pub fn parse_content_range(value: &str) -> Option<(u64, u64, u64)> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (range, length_str) = rest.split_once('/')?;
    let (start_str, end_str) = range.split_once('-')?;
    let start = start_str.parse().ok()?;
    let end = end_str.parse().ok()?;
    let length = length_str.trim().parse().ok()?;
    Some((start, end, length))
}

#[cfg(test)]
mod test {
    use super::{parse_content_range, parse_range, forwardable_headers, ParsedRange};

    #[test]
    fn range_basic() {
        assert_eq!(parse_range("bytes=0-65535"),
                   Some(ParsedRange { start: 0, end: Some(65535) }));
    }

    #[test]
    fn range_open_end() {
        assert_eq!(parse_range("bytes=1000-"),
                   Some(ParsedRange { start: 1000, end: None }));
    }

    #[test]
    fn range_rejects_open_start() {
        assert_eq!(parse_range("bytes=-500"), None);
    }

    #[test]
    fn range_rejects_multi_range() {
        assert_eq!(parse_range("bytes=0-100,200-300"), None);
    }

    #[test]
    fn range_rejects_garbage() {
        assert_eq!(parse_range("nonsense"), None);
    }

    #[test]
    fn content_range_basic() {
        assert_eq!(parse_content_range("bytes 0-32767/1048576"),
                   Some((0, 32767, 1048576)));
    }

    #[test]
    fn content_range_rejects_garbage() {
        assert_eq!(parse_content_range("not a content range"), None);
    }

    #[test]
    fn strips_proxy_headers_and_forces_keep_alive() {
        let headers = vec![
            ("Host".to_string(), "example.com".to_string()),
            ("Proxy-Authorization".to_string(), "secret".to_string()),
            ("proxy-connection".to_string(), "keep-alive".to_string()),
            ("Connection".to_string(), "close".to_string()),
            ("Accept".to_string(), "*/*".to_string()),
        ];
        let forwarded = forwardable_headers(&headers);
        assert!(forwarded.iter().any(|(n, _)| n == "Host"));
        assert!(forwarded.iter().any(|(n, _)| n == "Accept"));
        assert!(!forwarded.iter().any(|(n, _)| n.to_ascii_lowercase().starts_with("proxy-")));
        let connection: Vec<_> = forwarded.iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("connection"))
            .collect();
        assert_eq!(connection, vec![&("Connection".to_string(), "keep-alive".to_string())]);
    }
}
