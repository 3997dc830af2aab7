//! Secret-free views of requests and responses for logs.
use std::env;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

const RAW_ENV: &str = "DIGEST_HTTP_RAW";
pub(crate) const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_LEN: usize = 500;
const REDACTED: &str = "<redacted>";

const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key", "proxy-authorization"];
const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "auth",
    "bearer",
    "client_secret",
    "key",
    "secret",
    "token",
];

/// `DIGEST_HTTP_RAW` set to `1`, `true` or `yes`.
pub(crate) fn raw_enabled() -> bool {
    env::var(RAW_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn matches_any(name: &str, list: &[&str]) -> bool {
    list.iter().any(|s| name.eq_ignore_ascii_case(s))
}

pub(crate) fn headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(name, value)| {
            let shown = if matches_any(name.as_str(), SECRET_HEADERS) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

pub(crate) fn params(pairs: &[(String, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            let shown = if matches_any(k, SECRET_PARAMS) {
                REDACTED.to_string()
            } else {
                v.clone()
            };
            (k.clone(), shown)
        })
        .collect()
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A pasteable curl line for the request, secrets replaced.
pub(crate) fn curl(
    method: &Method,
    url: &Url,
    query: &[(String, String)],
    hdrs: &HeaderMap,
    body: Option<&[u8]>,
) -> String {
    let mut shown = url.clone();
    if !query.is_empty() {
        shown.query_pairs_mut().extend_pairs(params(query));
    }
    let mut line = format!("curl -X{method}");
    for (name, value) in headers(hdrs) {
        line.push_str(" -H ");
        line.push_str(&shell_quote(&format!("{name}: {value}")));
    }
    match body.map(std::str::from_utf8) {
        Some(Ok(text)) => {
            line.push_str(" -d ");
            line.push_str(&shell_quote(&truncate(text, RAW_MAX_BODY)));
        }
        Some(Err(_)) => line.push_str(" --data-binary @-"),
        None => {}
    }
    line.push(' ');
    line.push_str(&shell_quote(shown.as_str()));
    line
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// First few hundred bytes of a body, lossily decoded.
pub(crate) fn snippet(body: &[u8]) -> String {
    truncate(&String::from_utf8_lossy(body), SNIPPET_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn secret_headers_and_params_are_hidden() {
        let mut h = HeaderMap::new();
        h.insert("x-api-key", HeaderValue::from_static("s3cret"));
        h.insert("accept", HeaderValue::from_static("application/json"));
        let shown = headers(&h);
        assert!(shown.contains(&("x-api-key".into(), REDACTED.into())));
        assert!(shown.contains(&("accept".into(), "application/json".into())));

        let shown = params(&[
            ("Token".into(), "abc".into()),
            ("query".into(), "from:bob".into()),
        ]);
        assert_eq!(shown[0].1, REDACTED);
        assert_eq!(shown[1].1, "from:bob");
    }

    #[test]
    fn curl_line_never_contains_secrets() {
        let url = Url::parse("https://api.example.com/2/tweets/search/recent").unwrap();
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_static("Bearer tok"));
        let line = curl(
            &Method::GET,
            &url,
            &[("api_key".into(), "k".into()), ("query".into(), "it's".into())],
            &h,
            None,
        );
        assert!(!line.contains("tok"));
        assert!(line.contains("api_key=%3Credacted%3E"));
        assert!(line.starts_with("curl -XGET -H 'authorization: <redacted>'"));
    }

    #[test]
    fn snippet_cuts_on_char_boundary() {
        let body = "é".repeat(400);
        let s = snippet(body.as_bytes());
        assert!(s.ends_with("..."));
        assert!(s.len() <= SNIPPET_LEN + 3);
    }
}
