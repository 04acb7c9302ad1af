//! Path fragment sanitization.
//!
//! Identifiers and nested paths arrive from semi-trusted HTTP input. Instead
//! of rejecting bad characters, they are stripped so the write path itself
//! never fails on them. An empty result is left for the caller to reject.

/// Keep only ASCII letters, digits, `-` and `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars().filter(|c| is_identifier_char(*c)).collect()
}

/// Like [`sanitize_identifier`], but also keeps `/` so that nested
/// directories survive.
pub fn sanitize_nested_path(raw: &str) -> String {
    raw.chars()
        .filter(|c| is_identifier_char(*c) || *c == '/')
        .collect()
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_strips_disallowed() {
        assert_eq!(sanitize_identifier("req-1"), "req-1");
        assert_eq!(sanitize_identifier("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_identifier("a b\tc\n"), "abc");
        assert_eq!(sanitize_identifier("ünïcødé_ok"), "ncd_ok");
        assert_eq!(sanitize_identifier("!!!"), "");
    }

    #[test]
    fn test_identifier_output_alphabet_and_idempotence() {
        let inputs = [
            "",
            "plain",
            "with space",
            "semi;colon",
            "..\\windows\\path",
            "emoji🚀rocket",
            "%2e%2e%2f",
            "tab\tnull\0end",
        ];
        for input in inputs {
            let once = sanitize_identifier(input);
            assert!(once
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            assert_eq!(sanitize_identifier(&once), once);
        }
    }

    #[test]
    fn test_nested_path_keeps_separators() {
        assert_eq!(sanitize_nested_path("device/42/boot"), "device/42/boot");
        assert_eq!(sanitize_nested_path("../up/./here"), "/up//here");
        assert_eq!(sanitize_nested_path("a\\b"), "ab");
        assert_eq!(sanitize_nested_path("...."), "");
    }
}
