//! URL normalization applied before any URL comparison.
//!
//! Attribute values observed in graph recordings are frequently double- or
//! triple-escaped (an entity-encoded URL percent-encoded again by the time
//! it lands in a `value` attribute), so a single decoding pass is not enough
//! to line them up with the URLs reported by the classifier.

use html_escape::decode_html_entities;
use percent_encoding::percent_decode_str;

/// Repeatedly applies HTML entity and percent decoding to `raw` until the
/// string no longer changes. The fixed point is the termination condition
/// itself: well-formed input strictly loses escapes on every pass, and input
/// that no pass can change is already done.
pub fn normalize_url(raw: &str) -> String {
    let mut current = raw.to_owned();
    loop {
        let entity_decoded = decode_html_entities(&current);
        let next = percent_decode_str(entity_decoded.as_ref())
            .decode_utf8_lossy()
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_urls_are_untouched() {
        assert_eq!(normalize_url("https://example.com/ad.png"), "https://example.com/ad.png");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn entities_are_decoded_to_a_fixed_point() {
        assert_eq!(normalize_url("a&amp;b"), "a&b");
        // Doubly escaped ampersand needs two passes.
        assert_eq!(normalize_url("a&amp;amp;b"), "a&b");
    }

    #[test]
    fn percent_escapes_are_decoded_to_a_fixed_point() {
        assert_eq!(normalize_url("https://example.com/?q=a%20b"), "https://example.com/?q=a b");
        assert_eq!(normalize_url("a%2525"), "a%");
    }

    #[test]
    fn mixed_escaping_layers_unwind() {
        // Entity layer over a percent layer.
        assert_eq!(normalize_url("https://x.test/?u=a%26amp%3Bb"), "https://x.test/?u=a&b");
    }

    #[test]
    fn stray_escapes_do_not_loop() {
        assert_eq!(normalize_url("100%"), "100%");
        assert_eq!(normalize_url("%ZZ"), "%ZZ");
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in [
            "https://example.com/ad.png",
            "a&amp;amp;b",
            "https://x.test/?u=a%26amp%3Bb",
            "%ZZ%25&amp;",
            "100%",
        ] {
            let once = normalize_url(s);
            assert_eq!(normalize_url(&once), once);
        }
    }
}
