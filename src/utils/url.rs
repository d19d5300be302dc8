// src/utils/url.rs

//! URL normalization and manipulation utilities.
//!
//! `normalize` produces the dedup key the frontier operates on: lowercased
//! scheme and host, fragment stripped, trailing slash normalized.

use url::Url;

/// Normalize a URL into the frontier's canonical dedup key.
///
/// Lowercases scheme and host, drops the fragment, keeps the query, and
/// strips a trailing slash from non-root paths. Returns `None` for inputs
/// that do not parse as absolute http(s) URLs.
///
/// # Examples
/// ```
/// use pageclass::utils::url::normalize;
///
/// assert_eq!(
///     normalize("HTTPS://Example.COM/About/#team"),
///     Some("https://example.com/About".to_string())
/// );
/// ```
pub fn normalize(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);
    // Url already lowercases scheme and host on parse
    let mut out = parsed.to_string();
    if parsed.path() != "/" && out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

/// Resolve a potentially relative href against a base URL and normalize it.
pub fn resolve_and_normalize(base: &Url, href: &str) -> Option<String> {
    let joined = base.join(href.trim()).ok()?;
    normalize(joined.as_str())
}

/// Extract the lowercased host from a URL string.
///
/// # Examples
/// ```
/// use pageclass::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://Example.COM/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Sitemap URL for the host of the given URL.
pub fn sitemap_url(url_str: &str) -> Option<String> {
    let parsed = Url::parse(url_str).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}/sitemap.xml", parsed.scheme(), host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_scheme_and_host() {
        assert_eq!(
            normalize("HTTP://WWW.Example.COM/Path"),
            Some("http://www.example.com/Path".to_string())
        );
    }

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize("https://example.com/page#section"),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(
            normalize("https://example.com/page/"),
            Some("https://example.com/page".to_string())
        );
        // Root keeps its slash
        assert_eq!(
            normalize("https://example.com/"),
            Some("https://example.com/".to_string())
        );
    }

    #[test]
    fn test_normalize_keeps_query() {
        assert_eq!(
            normalize("https://example.com/view?id=7#frag"),
            Some("https://example.com/view?id=7".to_string())
        );
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert_eq!(normalize("mailto:someone@example.com"), None);
        assert_eq!(normalize("javascript:void(0)"), None);
        assert_eq!(normalize("not a url"), None);
    }

    #[test]
    fn test_resolve_and_normalize() {
        let base = Url::parse("https://example.com/docs/index.html").unwrap();
        assert_eq!(
            resolve_and_normalize(&base, "guide.html#top"),
            Some("https://example.com/docs/guide.html".to_string())
        );
        assert_eq!(
            resolve_and_normalize(&base, "/About/"),
            Some("https://example.com/About".to_string())
        );
        assert_eq!(resolve_and_normalize(&base, "mailto:x@y.z"), None);
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Sub.Example.COM:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("invalid-url"), None);
    }

    #[test]
    fn test_sitemap_url() {
        assert_eq!(
            sitemap_url("https://example.com/deep/page"),
            Some("https://example.com/sitemap.xml".to_string())
        );
    }
}
