//! Cookie recovery from raw headers.
//!
//! Request-side and response-side cookies are recovered by two different
//! algorithms. The `Cookie` header the client sent is split literally. The
//! `Set-Cookie` headers the server returned go through a throwaway cookie store
//! keyed by the request URL and are read back, so the result follows the
//! store's domain, path, and expiry rules instead of the raw received list.

use cookie_store::{CookieStore, RawCookie};
use ureq::http::header::SET_COOKIE;
use ureq::http::HeaderMap;
use url::Url;

/// Split a `Cookie` header value into name/value pairs.
///
/// Segments without `=` are skipped; `name=` yields an empty value.
pub fn parse_cookie_header(header: &str) -> Vec<RawCookie<'static>> {
    header
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            Some(RawCookie::new(name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse every `Set-Cookie` header, dropping the ones that are not cookies.
pub(crate) fn set_cookie_headers(headers: &HeaderMap) -> Vec<RawCookie<'static>> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| {
            let raw = match value.to_str() {
                Ok(raw) => raw,
                Err(_) => {
                    tracing::warn!("ignoring non-ASCII Set-Cookie header");
                    return None;
                }
            };
            match RawCookie::parse(raw.to_string()) {
                Ok(cookie) => Some(cookie),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring malformed Set-Cookie header");
                    None
                }
            }
        })
        .collect()
}

/// Cookies a store would keep from these `Set-Cookie` headers for `url`.
///
/// Only name and value are returned. Cookies with longer paths come first;
/// cookies with equal path lengths keep the order they were set in.
pub fn normalize_response_cookies(headers: &HeaderMap, url: &Url) -> Vec<RawCookie<'static>> {
    let received = set_cookie_headers(headers);
    let fallback = default_path(url);
    let order: Vec<(String, String)> = received
        .iter()
        .map(|c| (c.name().to_string(), effective_path(c.path(), &fallback)))
        .collect();

    let mut store = CookieStore::default();
    store.store_response_cookies(received.into_iter(), url);

    let mut cookies: Vec<(usize, usize, RawCookie<'static>)> = store
        .matches(url)
        .into_iter()
        .map(|c| {
            let path = effective_path(RawCookie::path(c), &fallback);
            let seq = order
                .iter()
                .position(|(name, p)| name == c.name() && *p == path)
                .unwrap_or(usize::MAX);
            let cookie = RawCookie::new(c.name().to_string(), c.value().to_string());
            (path.len(), seq, cookie)
        })
        .collect();
    cookies.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    cookies.into_iter().map(|(_, _, cookie)| cookie).collect()
}

fn effective_path(path: Option<&str>, fallback: &str) -> String {
    match path {
        Some(path) if path.starts_with('/') => path.to_string(),
        _ => fallback.to_string(),
    }
}

/// Default cookie path for a request URL: its path up to the last `/`.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// `Cookie` header value for `url` from a store, if any cookie matches.
pub(crate) fn request_header_from_store(store: &CookieStore, url: &Url) -> Option<String> {
    let pairs: Vec<String> = store
        .get_request_values(url)
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use ureq::http::HeaderValue;

    use super::*;

    fn pairs<'a>(cookies: &'a [RawCookie<'static>]) -> Vec<(&'a str, &'a str)> {
        cookies.iter().map(|c| (c.name(), c.value())).collect()
    }

    fn set_cookies(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for &value in values {
            headers.append(SET_COOKIE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn cookie_header_splits_in_order() {
        let cookies = parse_cookie_header("a=1; b=2");
        assert_eq!(
            pairs(&cookies),
            vec![("a", "1"), ("b", "2")]
        );
    }

    #[test]
    fn cookie_header_edge_cases() {
        let cookies = parse_cookie_header(" ;flag; empty= ;  spaced = value ;k=v=w;");
        assert_eq!(
            pairs(&cookies),
            vec![
                ("empty", ""),
                ("spaced", "value"),
                ("k", "v=w"),
            ]
        );
    }

    #[test]
    fn empty_cookie_header_yields_nothing() {
        assert!(parse_cookie_header("").is_empty());
    }

    #[test]
    fn response_cookies_follow_store_rules() {
        let url = Url::parse("http://example.com/account").unwrap();
        let headers = set_cookies(&[
            "session=abc; Path=/",
            "foreign=1; Domain=other.org",
            "gone=1; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            "theme=dark; Path=/",
            "session=def; Path=/",
        ]);

        let cookies = normalize_response_cookies(&headers, &url);
        assert_eq!(
            pairs(&cookies),
            vec![
                ("session", "def"),
                ("theme", "dark"),
            ]
        );
    }

    #[test]
    fn response_cookies_put_longer_paths_first() {
        let url = Url::parse("http://example.com/a/b/c").unwrap();
        let headers = set_cookies(&["root=1; Path=/", "deep=2; Path=/a/b"]);
        let cookies = normalize_response_cookies(&headers, &url);
        assert_eq!(pairs(&cookies), vec![("deep", "2"), ("root", "1")]);
    }

    #[test]
    fn same_name_on_two_paths_yields_both_deepest_first() {
        let url = Url::parse("http://example.com/a/x").unwrap();
        let headers = set_cookies(&["id=root; Path=/", "id=deep; Path=/a"]);
        let cookies = normalize_response_cookies(&headers, &url);
        assert_eq!(pairs(&cookies), vec![("id", "deep"), ("id", "root")]);
    }

    #[test]
    fn cookie_without_path_uses_request_directory() {
        let url = Url::parse("http://example.com/docs/page").unwrap();
        let headers = set_cookies(&["site=1; Path=/", "local=1"]);
        let cookies = normalize_response_cookies(&headers, &url);
        assert_eq!(pairs(&cookies), vec![("local", "1"), ("site", "1")]);
    }

    #[test]
    fn default_path_is_directory_of_request_path() {
        let path = |u: &str| default_path(&Url::parse(u).unwrap());
        assert_eq!(path("http://example.com/"), "/");
        assert_eq!(path("http://example.com/page"), "/");
        assert_eq!(path("http://example.com/docs/page"), "/docs");
        assert_eq!(path("http://example.com/docs/"), "/docs");
    }

    #[test]
    fn response_cookies_scoped_to_other_paths_are_dropped() {
        let url = Url::parse("http://example.com/").unwrap();
        let headers = set_cookies(&["admin=1; Path=/admin", "site=1; Path=/"]);
        let cookies = normalize_response_cookies(&headers, &url);
        assert_eq!(pairs(&cookies), vec![("site", "1")]);
    }

    #[test]
    fn malformed_set_cookie_is_ignored() {
        let headers = set_cookies(&["=novalue", "ok=1"]);
        let parsed = set_cookie_headers(&headers);
        assert_eq!(pairs(&parsed), vec![("ok", "1")]);
    }

    #[test]
    fn store_produces_request_header() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut store = CookieStore::default();
        assert_eq!(request_header_from_store(&store, &url), None);

        store.store_response_cookies(set_cookie_headers(&set_cookies(&["a=1"])).into_iter(), &url);
        assert_eq!(request_header_from_store(&store, &url).as_deref(), Some("a=1"));
    }
}
