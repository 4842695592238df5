//! Rate-limit identity derivation.

use axum::http::HeaderMap;

/// Identity shared by every client that sends no forwarding headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client IP from proxy headers.
///
/// First entry of a non-empty `X-Forwarded-For`, else `X-Real-IP`, else
/// `"unknown"`. Header-less clients all share the `"unknown"` bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|v| !v.as_bytes().is_empty());
    if let Some(forwarded) = forwarded {
        let first = forwarded
            .to_str()
            .ok()
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .unwrap_or_default();
        if first.is_empty() {
            return UNKNOWN_CLIENT.to_string();
        }
        return first.to_string();
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let h = headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);
        assert_eq!(client_ip(&h), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&h), "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_for_is_unknown() {
        let h = headers(&[("x-forwarded-for", " , 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_blank_forwarded_for_header_falls_back_to_real_ip() {
        let h = headers(&[("x-forwarded-for", ""), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h), "198.51.100.2");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h), "198.51.100.2");
    }

    #[test]
    fn test_no_headers_is_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
