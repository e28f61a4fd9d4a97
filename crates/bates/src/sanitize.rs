//! Helpers for keeping span fields short and file names safe.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Used for span and log fields so logs do not carry full client paths.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Makes free text usable inside a single file-name component: spaces become
/// underscores and path separators or control characters are dropped.
pub fn file_component(text: &str) -> String {
    text.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/matters/2024-017/production/contract.pdf")),
            "contract.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_file_component() {
        assert_eq!(file_component("failed to apply stamp"), "failed_to_apply_stamp");
        assert_eq!(file_component("bad/name: here"), "badname_here");
        assert_eq!(file_component("  tabs\tand\nlines "), "tabsandlines");
    }
}
