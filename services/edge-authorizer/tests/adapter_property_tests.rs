//! Property-based tests for request adaptation and log hygiene.
//!
//! Property 1: Header flattening keeps every value in order
//! Property 2: Prefix stripping only removes whole segments
//! Property 3: Allowed origin is the Origin header, a Referer origin, or `*`
//! Property 4: Redacted output never carries a bearer credential
//! Property 5: Discovery URLs never double the slash
//! Property 6: Sanitized error messages carry no sensitive terms

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::json;

use edge_authorizer::cors::allowed_origin;
use edge_authorizer::edge::{CdnHeader, CdnRequest, EdgeResponse, strip_path_prefix, to_canonical};
use edge_authorizer::error::{contains_sensitive_info, sanitize_message};
use edge_authorizer::jwt::discovery::discovery_url;
use edge_authorizer::model::{CanonicalResponse, Headers, MultiValue};
use edge_authorizer::observability::{redact_to_string, truncate_token_signatures};

fn arb_header_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9=;/ ._-]{1,24}"
}

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn arb_host() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{1,15}\\.(com|org|io|net)"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: A header with n values becomes a single value only when
    /// n is 1, and the values survive the trip to the edge response in order.
    #[test]
    fn prop_header_values_flatten_and_keep_order(
        values in prop::collection::vec(arb_header_value(), 1..6),
    ) {
        let entries = values
            .iter()
            .map(|value| CdnHeader { key: Some("X-Trace".to_string()), value: value.clone() })
            .collect();
        let request = CdnRequest {
            method: "GET".to_string(),
            uri: "/api/x".to_string(),
            headers: BTreeMap::from([("x-trace".to_string(), entries)]),
            ..CdnRequest::default()
        };

        let canonical = to_canonical(request, None, "/api");
        let header = canonical.headers.get("x-trace").unwrap();
        prop_assert_eq!(matches!(header, MultiValue::Single(_)), values.len() == 1);
        prop_assert_eq!(header.values(), values.iter().map(String::as_str).collect::<Vec<_>>());

        let response = CanonicalResponse::new(200).with_header("X-Trace", MultiValue::from_values(values.clone()));
        let edge = EdgeResponse::from_canonical(&response);
        prop_assert_eq!(edge.header_values("x-trace"), values.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// Property 2: The prefix is removed exactly when it is followed by a
    /// segment boundary, and the result always starts with a slash.
    #[test]
    fn prop_prefix_stripped_at_segment_boundary(
        prefix in arb_segment(),
        rest in prop::collection::vec(arb_segment(), 0..4),
        glued in arb_segment(),
    ) {
        let prefix = format!("/{prefix}");
        let tail: String = rest.iter().map(|segment| format!("/{segment}")).collect();

        let stripped = strip_path_prefix(&format!("{prefix}{tail}"), &prefix);
        let expected = if tail.is_empty() { "/".to_string() } else { tail };
        prop_assert_eq!(stripped, expected);

        let unrelated = format!("{prefix}{glued}");
        prop_assert_eq!(strip_path_prefix(&unrelated, &prefix), unrelated);
    }

    /// Property 3: Origin wins; otherwise the Referer is reduced to its
    /// origin; otherwise the wildcard.
    #[test]
    fn prop_allowed_origin_resolution(
        origin_host in arb_host(),
        referer_host in arb_host(),
        page in arb_segment(),
        with_origin in any::<bool>(),
    ) {
        let origin = format!("https://{origin_host}");
        let mut headers: Headers = [("Referer", format!("https://{referer_host}/{page}?q=1"))]
            .into_iter()
            .collect();
        if with_origin {
            headers.insert("Origin", origin.as_str());
        }

        let expected = if with_origin { origin } else { format!("https://{referer_host}") };
        prop_assert_eq!(allowed_origin(&headers), expected);
        prop_assert_eq!(allowed_origin(&Headers::new()), "*");
    }

    /// Property 4: No bearer credential or token signature reaches the log
    /// text, whatever key it hides under.
    #[test]
    fn prop_redaction_hides_credentials(
        key in "[a-zA-Z]{1,12}",
        header in "eyJ[a-zA-Z0-9_-]{8,20}",
        payload in "eyJ[a-zA-Z0-9_-]{8,20}",
        signature in "[a-zA-Z0-9_-]{16,40}",
    ) {
        let token = format!("{header}.{payload}.{signature}");
        let mut payload_map = json!({
            "headers": {"Authorization": format!("Bearer {token}")},
            "note": format!("saw {token} in cookie"),
        });
        payload_map[format!("x{key}")] = json!(format!("Bearer {token}"));
        let text = redact_to_string(&payload_map);

        prop_assert!(!text.contains(&signature));
        prop_assert!(!text.contains("Bearer "));

        let truncated = truncate_token_signatures(&token);
        prop_assert_eq!(truncated.as_ref(), format!("{header}.{payload}.<sig>"));
    }

    /// Property 5: Issuers with or without a trailing slash or scheme map
    /// to one well-formed discovery URL.
    #[test]
    fn prop_discovery_url_single_slash(
        host in arb_host(),
        path in prop::collection::vec(arb_segment(), 0..3),
        trailing in any::<bool>(),
        scheme in any::<bool>(),
    ) {
        let base: String = std::iter::once(host.clone())
            .chain(path.iter().cloned())
            .collect::<Vec<_>>()
            .join("/");
        let issuer = format!(
            "{}{base}{}",
            if scheme { "https://" } else { "" },
            if trailing { "/" } else { "" },
        );

        let url = discovery_url(&issuer);
        prop_assert_eq!(url.clone(), format!("https://{base}/.well-known/openid-configuration"));
        prop_assert!(!url["https://".len()..].contains("//"));
    }

    /// Property 6: Sanitized messages never contain sensitive terms.
    #[test]
    fn prop_sanitized_messages_safe(
        prefix in "[a-z ]{0,20}",
        secret in prop_oneof![
            Just("password=hunter2"),
            Just("client_secret leaked"),
            Just("token expired"),
        ],
    ) {
        let sanitized = sanitize_message(&format!("{prefix}{secret}"));
        prop_assert!(!contains_sensitive_info(&sanitized));
    }
}
