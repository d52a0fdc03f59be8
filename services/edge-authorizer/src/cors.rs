//! CORS origin resolution.

use url::Url;

use crate::model::Headers;

/// Response header naming the allowed origin.
pub const ALLOW_ORIGIN_HEADER: &str = "access-control-allow-origin";

/// Origin to allow: the request's `Origin`, else the origin of its `Referer`,
/// else `*`.
#[must_use]
pub fn allowed_origin(headers: &Headers) -> String {
    headers
        .get_first("origin")
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .or_else(|| headers.get_first("referer").and_then(referer_origin))
        .unwrap_or_else(|| "*".to_string())
}

fn referer_origin(referer: &str) -> Option<String> {
    let origin = Url::parse(referer.trim()).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_preferred() {
        let headers: Headers = [("Origin", "https://app.example.com"), ("Referer", "https://x.example/p")]
            .into_iter()
            .collect();
        assert_eq!(allowed_origin(&headers), "https://app.example.com");
    }

    #[test]
    fn test_referer_reduced_to_origin() {
        let headers: Headers = [("referer", "https://app.example.com:8443/page?q=1")]
            .into_iter()
            .collect();
        assert_eq!(allowed_origin(&headers), "https://app.example.com:8443");
    }

    #[test]
    fn test_wildcard_fallback() {
        assert_eq!(allowed_origin(&Headers::new()), "*");
        let headers: Headers = [("Referer", "not a url")].into_iter().collect();
        assert_eq!(allowed_origin(&headers), "*");
    }
}
