/// Drops the path parameters, query string and fragment of a url. Those tend to carry session tokens and search
/// terms which have no place in an activity log.
pub fn sanitize_url(url: &str) -> &str {
    let end = url.find(|c| c == ';' || c == '?' || c == '#').unwrap_or(url.len());
    &url[..end]
}

/// Replaces every non-ascii character with a space.
pub fn remove_non_ascii(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii() { c } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{remove_non_ascii, sanitize_url};

    #[test]
    fn url_query_and_fragment_are_removed() {
        assert_eq!(
            sanitize_url("https://mail.example.com/inbox?token=abc#message-1"),
            "https://mail.example.com/inbox"
        );
        assert_eq!(
            sanitize_url("https://example.com/a#top"),
            "https://example.com/a"
        );
        assert_eq!(
            sanitize_url("https://example.com/doc;jsessionid=42?x=1"),
            "https://example.com/doc"
        );
        assert_eq!(sanitize_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn non_ascii_becomes_space() {
        assert_eq!(remove_non_ascii("café — menu"), "caf    menu");
    }
}
