//! Client identity extraction from proxy headers.
//!
//! Resolution order:
//! 1. `CF-Connecting-IP` (set by the CDN)
//! 2. `X-Real-IP`
//! 3. first entry of `X-Forwarded-For`
//! 4. the literal `"unknown"`

use axum::http::HeaderMap;

pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identity used when no proxy header carries one.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive a client key from proxy-aware headers.
pub fn client_identity(headers: &HeaderMap) -> String {
    header_str(headers, CF_CONNECTING_IP)
        .or_else(|| header_str(headers, X_REAL_IP))
        .or_else(|| {
            header_str(headers, X_FORWARDED_FOR)
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|first| !first.is_empty())
        })
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cdn_header_wins() {
        let map = headers(&[
            (CF_CONNECTING_IP, "203.0.113.7"),
            (X_REAL_IP, "198.51.100.2"),
            (X_FORWARDED_FOR, "192.0.2.1, 10.0.0.1"),
        ]);
        assert_eq!(client_identity(&map), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_before_forwarded_for() {
        let map = headers(&[(X_REAL_IP, "198.51.100.2"), (X_FORWARDED_FOR, "192.0.2.1")]);
        assert_eq!(client_identity(&map), "198.51.100.2");
    }

    #[test]
    fn test_first_forwarded_for_entry() {
        let map = headers(&[(X_FORWARDED_FOR, " 192.0.2.1 , 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_identity(&map), "192.0.2.1");
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(client_identity(&HeaderMap::new()), UNKNOWN_CLIENT);
        let map = headers(&[(X_FORWARDED_FOR, " , 10.0.0.1")]);
        assert_eq!(client_identity(&map), UNKNOWN_CLIENT);
    }
}
