//! URL extraction and tracking-parameter removal.
//!
//! Only the first usable link of a message is ever relayed. The extractor is
//! deliberately loose (anything that looks like `http(s)://...`), while the
//! sanitizer relies on the `url` crate for parsing and query rebuilding.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use crate::config::RelaySettings;
use lazy_regex::lazy_regex;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Match URL-shaped substrings: scheme followed by RFC 3986 characters.
static RE_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)https?://[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+");

/// Query keys stripped from every relayed link.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "igsh",
    "igshid",
    "fbclid",
    "gclid",
    "dclid",
    "msclkid",
    "yclid",
    "mc_cid",
    "mc_eid",
    "ref",
    "referral",
    "source",
    "share_id",
    "share_token",
    "si",
];

/// Set of query keys considered tracking/attribution noise.
///
/// Keys are stored and compared in ASCII lowercase.
#[derive(Debug, Clone)]
pub struct TrackingDenylist {
    keys: HashSet<String>,
}

impl Default for TrackingDenylist {
    fn default() -> Self {
        Self {
            keys: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|key| (*key).to_string())
                .collect(),
        }
    }
}

impl TrackingDenylist {
    /// Default keys plus the operator's `EXTRA_TRACKING_PARAMS`.
    #[must_use]
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let mut denylist = Self::default();
        denylist.keys.extend(settings.extra_tracking_params());
        denylist
    }

    /// Whether a query key is denylisted.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&key.to_ascii_lowercase())
    }
}

/// A URL with every denylisted query key removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedUrl(String);

impl SanitizedUrl {
    /// The sanitized URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip trailing punctuation that belongs to the surrounding sentence.
fn trim_trailing_punctuation(candidate: &str) -> &str {
    let mut end = candidate.len();
    loop {
        let current = &candidate[..end];
        let Some(last) = current.chars().last() else {
            return current;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' => true,
            ')' => current.matches('(').count() < current.matches(')').count(),
            _ => false,
        };
        if !strip {
            return current;
        }
        end -= last.len_utf8();
    }
}

fn parse_web_url(candidate: &str) -> Option<Url> {
    let parsed = Url::parse(candidate).ok()?;
    let web_scheme = matches!(parsed.scheme(), "http" | "https");
    (web_scheme && parsed.host_str().is_some_and(|host| !host.is_empty())).then_some(parsed)
}

/// Find the first well-formed `http`/`https` URL in free text.
///
/// # Examples
///
/// ```
/// use oxide_relay_core::link::extract_url;
/// let text = "check this out https://example.com/p/1?utm_source=ig&x=2 thanks";
/// assert_eq!(extract_url(text), Some("https://example.com/p/1?utm_source=ig&x=2"));
/// assert_eq!(extract_url("no links here"), None);
/// ```
#[must_use]
pub fn extract_url(text: &str) -> Option<&str> {
    RE_URL
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()))
        .find(|candidate| parse_web_url(candidate).is_some())
}

/// Remove every denylisted query parameter from `url`.
///
/// Scheme, host, path and fragment are preserved; the remaining query pairs
/// keep their relative order. A URL without denylisted keys is returned
/// exactly as given, without normalization. Returns `None` if `url` does not parse.
///
/// # Examples
///
/// ```
/// use oxide_relay_core::link::{sanitize_url, TrackingDenylist};
/// let denylist = TrackingDenylist::default();
/// let clean = sanitize_url("https://example.com/p/1?utm_source=ig&x=2", &denylist);
/// assert_eq!(clean.map(|u| u.to_string()).as_deref(), Some("https://example.com/p/1?x=2"));
/// ```
#[must_use]
pub fn sanitize_url(url: &str, denylist: &TrackingDenylist) -> Option<SanitizedUrl> {
    let mut parsed = Url::parse(url).ok()?;

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !pairs.iter().any(|(key, _)| denylist.contains(key)) {
        return Some(SanitizedUrl(url.to_string()));
    }

    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(key, _)| !denylist.contains(key))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(key, value)| (key.as_str(), value.as_str())));
    }

    Some(SanitizedUrl(parsed.into()))
}

/// Extract the first URL from `text` and sanitize it.
#[must_use]
pub fn find_link(text: &str, denylist: &TrackingDenylist) -> Option<SanitizedUrl> {
    extract_url(text).and_then(|url| sanitize_url(url, denylist))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(url: &str) -> Option<String> {
        sanitize_url(url, &TrackingDenylist::default()).map(|u| u.to_string())
    }

    #[test]
    fn test_extract_first_url_only() {
        let text = "one https://a.example/x and two https://b.example/y";
        assert_eq!(extract_url(text), Some("https://a.example/x"));
    }

    #[test]
    fn test_extract_trims_sentence_punctuation() {
        assert_eq!(
            extract_url("look: https://example.com/p/1."),
            Some("https://example.com/p/1")
        );
        assert_eq!(
            extract_url("(see https://example.com/p/1)"),
            Some("https://example.com/p/1")
        );
        assert_eq!(
            extract_url("https://en.example.org/wiki/Rust_(language)"),
            Some("https://en.example.org/wiki/Rust_(language)")
        );
    }

    #[test]
    fn test_extract_skips_malformed_candidates() {
        assert_eq!(extract_url("http:// nothing"), None);
        assert_eq!(
            extract_url("https://[broken then https://ok.example/a"),
            Some("https://ok.example/a")
        );
        assert_eq!(extract_url("ftp://files.example/a"), None);
    }

    #[test]
    fn test_scenario_a() {
        let text = "check this out https://example.com/p/1?utm_source=ig&x=2 thanks";
        let extracted = extract_url(text);
        assert_eq!(extracted, Some("https://example.com/p/1?utm_source=ig&x=2"));

        let link = find_link(text, &TrackingDenylist::default()).map(|u| u.to_string());
        assert_eq!(link.as_deref(), Some("https://example.com/p/1?x=2"));
    }

    #[test]
    fn test_sanitize_removes_all_query_when_only_tracking() {
        assert_eq!(
            clean("https://www.instagram.com/p/abc/?igsh=MTc4&utm_source=qr").as_deref(),
            Some("https://www.instagram.com/p/abc/")
        );
    }

    #[test]
    fn test_sanitize_keys_are_case_insensitive() {
        assert_eq!(
            clean("https://example.com/a?UTM_Source=x&id=5").as_deref(),
            Some("https://example.com/a?id=5")
        );
    }

    #[test]
    fn test_sanitize_preserves_fragment_and_order() {
        assert_eq!(
            clean("https://example.com/a?b=1&fbclid=zz&a=2#frag").as_deref(),
            Some("https://example.com/a?b=1&a=2#frag")
        );
    }

    #[test]
    fn test_sanitize_leaves_clean_urls_untouched() {
        let url = "https://example.com/a?q=hello%20world&t=42";
        assert_eq!(clean(url).as_deref(), Some(url));
    }

    #[test]
    fn test_sanitize_does_not_normalize_clean_urls() {
        for url in [
            "https://Example.com",
            "https://example.com:443/x",
            "HTTPS://www.example.com/p/1?a=1",
        ] {
            assert_eq!(clean(url).as_deref(), Some(url));
        }
    }

    #[test]
    fn test_sanitize_rejects_garbage() {
        assert_eq!(clean("not a url"), None);
    }

    #[test]
    fn test_extra_params_from_settings() {
        let settings = RelaySettings {
            extra_tracking_params_str: Some("xmt".to_string()),
            ..RelaySettings::default()
        };
        let denylist = TrackingDenylist::from_settings(&settings);
        let link = sanitize_url("https://x.example/s/1?xmt=abc&s=20", &denylist);
        assert_eq!(
            link.map(|u| u.to_string()).as_deref(),
            Some("https://x.example/s/1?s=20")
        );
    }
}
