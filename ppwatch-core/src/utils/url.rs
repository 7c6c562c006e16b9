//! Feed URL normalization and encoding.

use url::Url;

/// Normalize a feed URL for comparison.
///
/// Lowercases, strips trailing slashes, and folds `http://` into
/// `https://` so that trivially different spellings of the same feed
/// compare equal. Rule patterns and incoming podping URLs both go
/// through this exactly once.
pub fn normalize_url(url: &str) -> String {
    let mut url = url.trim().to_lowercase();
    while url.ends_with('/') {
        url.pop();
    }
    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    url
}

/// Percent-encode a feed URL so it is a valid URL for HTTP fetches.
///
/// Podping IRIs may contain unencoded spaces or non-ASCII characters;
/// parsing through [`Url`] performs the IRI → URL conversion (percent
/// encoding, IDNA host mapping). A string that does not parse at all is
/// returned unchanged.
pub fn encode_feed_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_strips_slashes() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/Feed.XML/"),
            "https://example.com/feed.xml"
        );
    }

    #[test]
    fn normalize_folds_http_into_https() {
        assert_eq!(
            normalize_url("http://example.com/feed.xml"),
            "https://example.com/feed.xml"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_url("http://Example.com/a/");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn encode_escapes_spaces_and_unicode() {
        assert_eq!(
            encode_feed_url("https://example.com/my feed.xml"),
            "https://example.com/my%20feed.xml"
        );
        assert_eq!(
            encode_feed_url("https://example.com/fü.xml"),
            "https://example.com/f%C3%BC.xml"
        );
    }

    #[test]
    fn encode_leaves_unparseable_input_alone() {
        assert_eq!(encode_feed_url("not a url"), "not a url");
    }
}
