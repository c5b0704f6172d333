//! Small text helpers used for previews and listings.

/// Shorten `s` to at most `max_chars` characters, appending `...` when
/// anything was cut. Counts characters, so multi-byte text is never split.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 100), "hello");
        assert_eq!(truncate_chars("", 100), "");
    }

    #[test]
    fn test_exact_length_untouched() {
        let s = "a".repeat(100);
        assert_eq!(truncate_chars(&s, 100), s);
    }

    #[test]
    fn test_long_text_truncated_with_ellipsis() {
        let s = "b".repeat(150);
        let out = truncate_chars(&s, 100);
        assert_eq!(out.len(), 103);
        assert!(out.ends_with("..."));
        assert!(out.starts_with(&"b".repeat(100)));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let s = "é".repeat(101);
        let out = truncate_chars(&s, 100);
        assert_eq!(out.chars().count(), 103);
    }
}
